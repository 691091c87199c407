//! Code tables for the QA bands of common Landsat and Sentinel-2 products,
//! and the cloud-mask rules built from them.

use super::qa_mask::{MaskRule, QaCodeTable};
use crate::types::{MosaicError, MosaicResult};

/// Landsat 4/5/7 surface reflectance `sr_cloud_qa` band
pub fn landsat457_sr_cloud_qa() -> QaCodeTable {
    QaCodeTable::new("LANDSAT457_SR", "sr_cloud_qa")
        .with_threshold("any", 1)
        .with_codes("ddv", &[1, 9])
        .with_codes("cloud", &[2, 34])
        .with_codes("cloud_shadow", &[4, 12, 20, 36, 52])
        .with_codes("adjacent_cloud", &[8, 12, 24, 40, 56])
        .with_codes("snow", &[16, 20, 24, 48, 52, 56])
        .with_codes("water", &[32, 34, 36, 40, 48, 52, 56])
}

/// Landsat 4/5/7 surface reflectance `pixel_qa` band
pub fn landsat457_pixel_qa() -> QaCodeTable {
    QaCodeTable::new("LANDSAT457_SR", "pixel_qa")
        .with_codes("fill", &[1])
        .with_codes("clear", &[66, 130])
        .with_codes("water", &[68, 132])
        .with_codes("cloud_shadow", &[72, 136])
        .with_codes("snow_ice", &[80, 112, 144, 176])
        .with_codes("cloud", &[96, 112, 160, 176, 224])
        .with_codes("low_conf_cloud", &[66, 68, 72, 80, 96, 112])
        .with_codes("medium_conf_cloud", &[130, 132, 136, 144, 160, 176])
        .with_codes("high_conf_cloud", &[224])
}

/// Landsat 8 surface reflectance `pixel_qa` band
pub fn landsat8_pixel_qa() -> QaCodeTable {
    QaCodeTable::new("LANDSAT8_SR", "pixel_qa")
        .with_codes("fill", &[1])
        .with_codes("clear", &[322, 386, 834, 898, 1346])
        .with_codes("water", &[324, 388, 836, 900, 1348])
        .with_codes("cloud_shadow", &[328, 392, 840, 904, 1350])
        .with_codes(
            "snow_ice",
            &[336, 368, 400, 432, 848, 880, 912, 944, 1352],
        )
        .with_codes(
            "cloud",
            &[352, 368, 416, 432, 480, 864, 880, 928, 944, 992],
        )
        .with_codes(
            "low_conf_cloud",
            &[322, 324, 328, 336, 352, 368, 834, 836, 840, 848, 864, 880],
        )
        .with_codes(
            "medium_conf_cloud",
            &[386, 388, 392, 400, 416, 432, 898, 900, 904, 928, 944],
        )
        .with_codes("high_conf_cloud", &[480, 992])
        .with_codes(
            "low_conf_cirrus",
            &[322, 324, 328, 336, 352, 368, 386, 388, 392, 400, 416, 432, 480],
        )
        .with_codes(
            "high_conf_cirrus",
            &[834, 836, 840, 848, 864, 880, 898, 900, 904, 912, 928, 944, 992],
        )
        .with_codes("terrain_occlusion", &[1346, 1348, 1350, 1352])
}

/// Sentinel-2 `QA60` band (bit 10 opaque cloud, bit 11 cirrus)
pub fn sentinel2_qa60() -> QaCodeTable {
    QaCodeTable::new("SENTINEL2", "QA60")
        .with_bit("cloud", 10)
        .with_bit("cirrus", 11)
}

/// Cloud and cloud shadow from Landsat `pixel_qa`
pub fn landsat_pixel_qa_cloud_mask() -> Vec<MaskRule> {
    vec![MaskRule::new(landsat457_pixel_qa(), &["cloud_shadow", "cloud"])]
}

/// Cloud and shadow from `pixel_qa`, plus cloud, shadow and adjacent-to-cloud from `sr_cloud_qa`
pub fn landsat457_cloud_mask() -> Vec<MaskRule> {
    vec![
        MaskRule::new(landsat457_pixel_qa(), &["cloud_shadow", "cloud"]),
        MaskRule::new(
            landsat457_sr_cloud_qa(),
            &["cloud", "cloud_shadow", "adjacent_cloud"],
        ),
    ]
}

/// Every non-clear `sr_cloud_qa` pixel masked
pub fn landsat457_sr_cloud_qa_strict_mask() -> Vec<MaskRule> {
    vec![MaskRule::new(landsat457_sr_cloud_qa(), &["any"])]
}

pub fn landsat8_cloud_mask() -> Vec<MaskRule> {
    vec![MaskRule::new(landsat8_pixel_qa(), &["cloud_shadow", "cloud"])]
}

pub fn sentinel2_cloud_mask() -> Vec<MaskRule> {
    vec![MaskRule::new(sentinel2_qa60(), &["cloud", "cirrus"])]
}

/// Names accepted by [`code_table_preset`]
pub const CODE_TABLE_PRESETS: &[&str] = &[
    "landsat457_sr_cloud_qa",
    "landsat457_pixel_qa",
    "landsat8_pixel_qa",
    "sentinel2_qa60",
];

/// Names accepted by [`mask_preset`]
pub const MASK_PRESETS: &[&str] = &[
    "landsat_pixel_qa_cloud",
    "landsat457_cloud",
    "landsat457_sr_cloud_qa_strict",
    "landsat8_cloud",
    "sentinel2_cloud",
];

pub fn code_table_preset(name: &str) -> MosaicResult<QaCodeTable> {
    match name {
        "landsat457_sr_cloud_qa" => Ok(landsat457_sr_cloud_qa()),
        "landsat457_pixel_qa" => Ok(landsat457_pixel_qa()),
        "landsat8_pixel_qa" => Ok(landsat8_pixel_qa()),
        "sentinel2_qa60" => Ok(sentinel2_qa60()),
        _ => Err(MosaicError::UnknownPreset(name.to_string())),
    }
}

pub fn mask_preset(name: &str) -> MosaicResult<Vec<MaskRule>> {
    match name {
        "landsat_pixel_qa_cloud" => Ok(landsat_pixel_qa_cloud_mask()),
        "landsat457_cloud" => Ok(landsat457_cloud_mask()),
        "landsat457_sr_cloud_qa_strict" => Ok(landsat457_sr_cloud_qa_strict_mask()),
        "landsat8_cloud" => Ok(landsat8_cloud_mask()),
        "sentinel2_cloud" => Ok(sentinel2_cloud_mask()),
        _ => Err(MosaicError::UnknownPreset(name.to_string())),
    }
}
