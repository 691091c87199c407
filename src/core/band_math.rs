use super::period::date_number;
use crate::types::{Band, MosaicResult, Raster};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Arithmetic between two bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BandOp {
    fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            BandOp::Add => a + b,
            BandOp::Subtract => a - b,
            BandOp::Multiply => a * b,
            BandOp::Divide => a / b,
        }
    }
}

/// Add band `name` = `a` op `b`. Division by zero yields a non-finite (missing) value.
pub fn combine_bands(raster: &Raster, a: &str, b: &str, op: BandOp, name: &str) -> MosaicResult<Raster> {
    let out = Zip::from(raster.band(a)?)
        .and(raster.band(b)?)
        .map_collect(|&x, &y| op.apply(x, y));
    raster.clone().with_band(name, out)
}

/// (a - b) / (a + b), missing where the sum is zero
fn nd(a: &Band, b: &Band) -> Band {
    Zip::from(a).and(b).map_collect(|&x, &y| {
        let sum = x + y;
        if sum == 0.0 {
            f64::NAN
        } else {
            (x - y) / sum
        }
    })
}

/// Add band `name` = (a - b) / (a + b)
pub fn normalized_difference(raster: &Raster, a: &str, b: &str, name: &str) -> MosaicResult<Raster> {
    let out = nd(raster.band(a)?, raster.band(b)?);
    raster.clone().with_band(name, out)
}

/// Normalized-difference spectral indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpectralIndex {
    /// (NIR - Red) / (NIR + Red)
    Ndvi,
    /// (NIR - Green) / (NIR + Green)
    Gndvi,
    /// McFeeters: (Green - NIR) / (Green + NIR)
    NdwiMcFeeters,
    /// Gao, 1240 nm SWIR: (NIR - SWIR) / (NIR + SWIR)
    NdwiGao1240,
    /// Gao, 1640 nm SWIR
    NdwiGao1640,
    /// Gao, 2130 nm SWIR
    NdwiGao2130,
    /// (Green - SWIR) / (Green + SWIR)
    Mndwi,
}

impl SpectralIndex {
    /// Name of the band the index is written to
    pub fn band_name(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "NDVI",
            SpectralIndex::Gndvi => "GNDVI",
            SpectralIndex::NdwiMcFeeters => "NDWI_MF",
            SpectralIndex::NdwiGao1240 => "NDWI_G1",
            SpectralIndex::NdwiGao1640 => "NDWI_G2",
            SpectralIndex::NdwiGao2130 => "NDWI_G3",
            SpectralIndex::Mndwi => "MNDWI",
        }
    }
}

/// Add `index` computed from bands `first` and `second`, in the order of the index formula
pub fn add_index(raster: &Raster, index: SpectralIndex, first: &str, second: &str) -> MosaicResult<Raster> {
    normalized_difference(raster, first, second, index.band_name())
}

/// Floating Algae Index from 859 nm (NIR), 645 nm (red) and 1240 nm (SWIR) bands, as band `FAI`
pub fn floating_algae_index(raster: &Raster, nir: &str, red: &str, swir1240: &str) -> MosaicResult<Raster> {
    const WEIGHT: f64 = (859.0 - 645.0) / (1240.0 - 645.0);
    let out = Zip::from(raster.band(nir)?)
        .and(raster.band(red)?)
        .and(raster.band(swir1240)?)
        .map_collect(|&n, &r, &s| n - (r + (s - r) * WEIGHT));
    raster.clone().with_band("FAI", out)
}

/// Normalized Multi-band Drought Index, as band `NMDI`
pub fn normalized_multiband_drought_index(
    raster: &Raster,
    nir: &str,
    swir1640: &str,
    swir2130: &str,
) -> MosaicResult<Raster> {
    let out = Zip::from(raster.band(nir)?)
        .and(raster.band(swir1640)?)
        .and(raster.band(swir2130)?)
        .map_collect(|&n, &s1, &s2| {
            let diff = s1 - s2;
            let denom = n + diff;
            if denom == 0.0 {
                f64::NAN
            } else {
                (n - diff) / denom
            }
        });
    raster.clone().with_band("NMDI", out)
}

/// Add a band filled with `value`
pub fn add_constant(raster: &Raster, value: f64, name: &str) -> MosaicResult<Raster> {
    let out = Band::from_elem(raster.dim(), value);
    raster.clone().with_band(name, out)
}

/// Add band `Date` holding the acquisition date as `YYYYMMDD`
pub fn add_date(raster: &Raster) -> MosaicResult<Raster> {
    add_constant(raster, f64::from(date_number(raster.timestamp)), "Date")
}
