//! Display presets for composites
//!
//! Stretch and palette settings are serialized to JSON and consumed by an
//! external renderer; nothing here touches pixels.

use crate::types::{MosaicError, MosaicResult};
use serde::{Deserialize, Serialize};

/// Stretch bound, either shared by all bands or given per band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StretchValue {
    Uniform(f64),
    PerBand(Vec<f64>),
}

/// Visualization parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VisParams {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<StretchValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<StretchValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gamma: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub palette: Vec<String>,
    /// Outline colour for vector layers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl VisParams {
    fn rgb(bands: [&str; 3], min: f64, max: f64) -> Self {
        Self {
            bands: bands.iter().map(|b| b.to_string()).collect(),
            min: Some(StretchValue::Uniform(min)),
            max: Some(StretchValue::Uniform(max)),
            ..Self::default()
        }
    }

    fn with_gamma(mut self, gamma: [f64; 3]) -> Self {
        self.gamma = Some(gamma.to_vec());
        self
    }

    fn ramp(min: f64, max: f64, palette: &[&str]) -> Self {
        Self {
            min: Some(StretchValue::Uniform(min)),
            max: Some(StretchValue::Uniform(max)),
            palette: palette.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn to_json(&self) -> MosaicResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

const MODIS_GAMMA: [f64; 3] = [0.95, 1.1, 1.0];

pub const PRESET_NAMES: &[&str] = &[
    "modis_true",
    "modis_f1",
    "modis_f2",
    "modis09_true",
    "modis09_f1",
    "modis09_f2",
    "ls_true",
    "ls_f1",
    "ls_f2",
    "lsTOA_true",
    "lsTOA_f1",
    "lsTOA_f2",
    "ls8_true",
    "ls8_f1",
    "ls8_f2",
    "ls8TOA_true",
    "ls8TOA_f1",
    "ls8TOA_f2",
    "s1",
    "s2_true",
    "s2_f1",
    "s2_f2",
    "water",
    "water2",
    "col1",
    "prmm",
    "tas",
    "ndvi",
];

/// Look up a named display preset
pub fn vis_preset(name: &str) -> MosaicResult<VisParams> {
    let params = match name {
        "modis_true" => VisParams::rgb(
            ["Nadir_Reflectance_Band1", "Nadir_Reflectance_Band4", "Nadir_Reflectance_Band3"],
            0.0,
            3000.0,
        )
        .with_gamma(MODIS_GAMMA),
        "modis_f1" => VisParams::rgb(
            ["Nadir_Reflectance_Band2", "Nadir_Reflectance_Band1", "Nadir_Reflectance_Band4"],
            0.0,
            4000.0,
        )
        .with_gamma(MODIS_GAMMA),
        "modis_f2" => VisParams::rgb(
            ["Nadir_Reflectance_Band6", "Nadir_Reflectance_Band2", "Nadir_Reflectance_Band1"],
            0.0,
            4000.0,
        )
        .with_gamma(MODIS_GAMMA),
        "modis09_true" => VisParams::rgb(["sur_refl_b01", "sur_refl_b04", "sur_refl_b03"], 0.0, 3000.0)
            .with_gamma(MODIS_GAMMA),
        "modis09_f1" => VisParams::rgb(["sur_refl_b02", "sur_refl_b01", "sur_refl_b04"], 0.0, 4000.0)
            .with_gamma(MODIS_GAMMA),
        "modis09_f2" => VisParams::rgb(["sur_refl_b06", "sur_refl_b02", "sur_refl_b01"], 0.0, 4000.0)
            .with_gamma(MODIS_GAMMA),

        // Landsat 4-7 surface reflectance and TOA
        "ls_true" => VisParams::rgb(["B3", "B2", "B1"], 0.0, 4000.0),
        "ls_f1" => VisParams::rgb(["B4", "B3", "B2"], 0.0, 5000.0),
        "ls_f2" => VisParams::rgb(["B5", "B4", "B3"], 0.0, 5000.0),
        "lsTOA_true" => VisParams::rgb(["B3", "B2", "B1"], 0.0, 0.5),
        "lsTOA_f1" => VisParams::rgb(["B4", "B3", "B2"], 0.0, 0.5),
        "lsTOA_f2" => VisParams::rgb(["B5", "B4", "B3"], 0.0, 0.5),

        // Landsat 8
        "ls8_true" => VisParams::rgb(["B4", "B3", "B2"], 0.0, 5000.0),
        "ls8_f1" => VisParams::rgb(["B5", "B4", "B3"], 0.0, 5000.0),
        "ls8_f2" => VisParams::rgb(["B6", "B5", "B4"], 0.0, 5000.0),
        "ls8TOA_true" => VisParams::rgb(["B4", "B3", "B2"], 0.0, 0.5),
        "ls8TOA_f1" => VisParams::rgb(["B5", "B4", "B3"], 0.0, 0.5),
        "ls8TOA_f2" => VisParams::rgb(["B6", "B5", "B4"], 0.0, 0.5),

        // VV, VH (dB) and incidence angle
        "s1" => VisParams {
            min: Some(StretchValue::PerBand(vec![-30.0, -30.0, 0.0])),
            max: Some(StretchValue::PerBand(vec![0.0, 0.0, 90.0])),
            ..VisParams::default()
        },

        "s2_true" => VisParams::rgb(["B4", "B3", "B2"], 0.0, 4000.0),
        "s2_f1" => VisParams::rgb(["B8", "B4", "B3"], 0.0, 4000.0),
        "s2_f2" => VisParams::rgb(["B11", "B8", "B4"], 0.0, 4000.0),

        "water" => VisParams::ramp(0.0, 1.0, &["0291f7"]),
        "water2" => VisParams::ramp(0.0, 1.0, &["01e2f7"]),
        "col1" => VisParams {
            color: Some("35ffc9".to_string()),
            ..VisParams::default()
        },
        "prmm" => VisParams::ramp(0.0, 10.0, &["white", "blue"]),
        "tas" => VisParams::ramp(270.0, 320.0, &["blue", "orange", "red"]),
        "ndvi" => VisParams::ramp(-1.0, 1.0, &["blue", "white", "green"]),

        other => return Err(MosaicError::UnknownPreset(other.to_string())),
    };
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_preset_resolves() {
        for name in PRESET_NAMES {
            assert!(vis_preset(name).is_ok(), "preset {} missing", name);
        }
    }

    #[test]
    fn test_unknown_preset() {
        assert!(matches!(
            vis_preset("landsat9_true"),
            Err(MosaicError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_modis_gamma() {
        let params = vis_preset("modis09_f2").unwrap();
        assert_eq!(params.bands, vec!["sur_refl_b06", "sur_refl_b02", "sur_refl_b01"]);
        assert_eq!(params.gamma, Some(vec![0.95, 1.1, 1.0]));
        assert_eq!(params.max, Some(StretchValue::Uniform(4000.0)));
    }

    #[test]
    fn test_sentinel1_per_band_stretch() {
        let params = vis_preset("s1").unwrap();
        assert!(params.bands.is_empty());
        assert_eq!(params.min, Some(StretchValue::PerBand(vec![-30.0, -30.0, 0.0])));
    }

    #[test]
    fn test_json_skips_unset_fields() {
        let json = vis_preset("col1").unwrap().to_json().unwrap();
        assert_eq!(json, r#"{"color":"35ffc9"}"#);

        let json = vis_preset("ndvi").unwrap().to_json().unwrap();
        let back: VisParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back.palette, vec!["blue", "white", "green"]);
        assert_eq!(back.min, Some(StretchValue::Uniform(-1.0)));
    }
}
