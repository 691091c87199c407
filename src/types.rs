use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Real-valued band data (rows x cols)
pub type Band = Array2<f64>;

/// Per-pixel validity or condition flags (true = set)
pub type Mask = Array2<bool>;

/// Affine transform from pixel (row, col) to projected world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform with square pixels of `pixel_size` metres
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_size: f64) -> Self {
        Self {
            top_left_x,
            pixel_width: pixel_size,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height: -pixel_size,
        }
    }

    fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y
    }

    /// Ground area covered by one pixel
    pub fn pixel_area(&self) -> f64 {
        self.determinant().abs()
    }

    /// World coordinates of the centre of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let c = col as f64 + 0.5;
        let r = row as f64 + 0.5;
        (
            self.top_left_x + c * self.pixel_width + r * self.rotation_x,
            self.top_left_y + c * self.rotation_y + r * self.pixel_height,
        )
    }

    /// Pixel (row, col) containing world point (x, y), if inside a grid of `dim`
    pub fn world_to_pixel(&self, x: f64, y: f64, dim: (usize, usize)) -> Option<(usize, usize)> {
        let det = self.determinant();
        if det == 0.0 {
            return None;
        }

        let dx = x - self.top_left_x;
        let dy = y - self.top_left_y;
        let col = (self.pixel_height * dx - self.rotation_x * dy) / det;
        let row = (self.pixel_width * dy - self.rotation_y * dx) / det;

        if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
            return None;
        }

        let (row, col) = (row.floor() as usize, col.floor() as usize);
        if row < dim.0 && col < dim.1 {
            Some((row, col))
        } else {
            None
        }
    }

    /// Bounding box of a grid of `dim` pixels in world coordinates
    pub fn bounds(&self, dim: (usize, usize)) -> BoundingBox {
        let (rows, cols) = (dim.0 as f64, dim.1 as f64);
        let corners = [(0.0, 0.0), (0.0, cols), (rows, 0.0), (rows, cols)];

        let mut bbox = BoundingBox {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for (r, c) in corners {
            let x = self.top_left_x + c * self.pixel_width + r * self.rotation_x;
            let y = self.top_left_y + c * self.rotation_y + r * self.pixel_height;
            bbox.min_x = bbox.min_x.min(x);
            bbox.max_x = bbox.max_x.max(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_y = bbox.max_y.max(y);
        }
        bbox
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        // 30 m Landsat-like grid at the origin
        Self::north_up(0.0, 0.0, 30.0)
    }
}

/// Axis-aligned extent in projected coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }
}

/// One acquisition: named bands on a shared pixel grid plus an optional validity mask.
///
/// Rasters are immutable once built; every transform in this crate returns a new
/// `Raster`. All bands and the mask share the same dimensions.
#[derive(Debug, Clone)]
pub struct Raster {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub geo_transform: GeoTransform,
    bands: BTreeMap<String, Band>,
    mask: Option<Mask>,
    dim: Option<(usize, usize)>,
}

impl Raster {
    /// Create an empty raster; bands are attached with [`Raster::with_band`]
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>, geo_transform: GeoTransform) -> Self {
        Self {
            id: id.into(),
            timestamp,
            geo_transform,
            bands: BTreeMap::new(),
            mask: None,
            dim: None,
        }
    }

    /// Return a copy with `name` set to `data` (replacing any band of that name)
    pub fn with_band(mut self, name: impl Into<String>, data: Band) -> MosaicResult<Self> {
        self.check_dim(data.dim(), "band")?;
        self.dim = Some(data.dim());
        self.bands.insert(name.into(), data);
        Ok(self)
    }

    /// Return a copy whose mask is replaced by `mask`
    pub fn with_mask(mut self, mask: Mask) -> MosaicResult<Self> {
        self.check_dim(mask.dim(), "mask")?;
        self.dim = Some(mask.dim());
        self.mask = Some(mask);
        Ok(self)
    }

    fn check_dim(&self, found: (usize, usize), what: &str) -> MosaicResult<()> {
        match self.dim {
            Some(expected) if expected != found => Err(MosaicError::DimensionMismatch {
                expected,
                found,
                context: format!("{} of raster '{}'", what, self.id),
            }),
            _ => Ok(()),
        }
    }

    /// Grid dimensions (rows, cols); (0, 0) for a raster with no bands
    pub fn dim(&self) -> (usize, usize) {
        self.dim.unwrap_or((0, 0))
    }

    /// Look up a band, failing with `MissingBand` if absent
    pub fn band(&self, name: &str) -> MosaicResult<&Band> {
        self.bands.get(name).ok_or_else(|| MosaicError::MissingBand {
            band: name.to_string(),
            raster: self.id.clone(),
        })
    }

    pub fn has_band(&self, name: &str) -> bool {
        self.bands.contains_key(name)
    }

    pub fn band_names(&self) -> Vec<String> {
        self.bands.keys().cloned().collect()
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn bands(&self) -> impl Iterator<Item = (&String, &Band)> {
        self.bands.iter()
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    /// Mask flag at (row, col); true when the raster carries no mask.
    /// Coordinates outside the grid are never unmasked.
    pub fn is_unmasked(&self, row: usize, col: usize) -> bool {
        let (rows, cols) = self.dim();
        if row >= rows || col >= cols {
            return false;
        }
        self.mask.as_ref().map_or(true, |m| m[[row, col]])
    }

    /// Effective validity mask (all true when the raster carries no mask)
    pub fn validity(&self) -> Mask {
        match &self.mask {
            Some(mask) => mask.clone(),
            None => Mask::from_elem(self.dim(), true),
        }
    }

    /// Number of pixels whose mask flag is set
    pub fn valid_pixel_count(&self) -> usize {
        match &self.mask {
            Some(mask) => mask.iter().filter(|&&v| v).count(),
            None => self.dim().0 * self.dim().1,
        }
    }
}

/// Error types for QA masking and compositing
#[derive(Debug, thiserror::Error)]
pub enum MosaicError {
    #[error("Band '{band}' not found in raster '{raster}'")]
    MissingBand { band: String, raster: String },

    #[error("Region '{0}' has zero area")]
    ZeroAreaRegion(String),

    #[error("Dimension mismatch for {context}: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        found: (usize, usize),
        context: String,
    },

    #[error("Condition '{condition}' is not defined in QA table '{product}'")]
    UnknownCondition { condition: String, product: String },

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for masking and compositing operations
pub type MosaicResult<T> = Result<T, MosaicError>;
