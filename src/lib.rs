//! qamosaic: QA-masked temporal compositing of satellite image time series
//!
//! Decodes product QA bands into per-condition masks, removes cloud and
//! shadow pixels, reduces time series into daily or monthly composites, and
//! measures how much of a region each image actually observes.

pub mod types;
pub mod io;
pub mod core;
pub mod viz;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{Band, BoundingBox, GeoTransform, Mask, MosaicError, MosaicResult, Raster};

pub use crate::core::{
    CompositePipeline, CompositeResult, MaskRule, Period, PeriodUnit, QaCodeTable, ReductionRule,
    Region, TemporalCompositor,
};
pub use io::{CollectingSink, CsvSink, ResultSink};
pub use viz::{vis_preset, VisParams};
