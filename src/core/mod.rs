//! Core masking and compositing modules

pub mod qa_mask;
pub mod qa_tables;
pub mod period;
pub mod composite;
pub mod coverage;
pub mod band_math;
pub mod pipeline;

// Re-export main types
pub use qa_mask::{
    apply_mask, build_validity_mask, classify, mask_with_rules, MaskRule, QaCodeTable, QaCondition,
    QaPredicate,
};
pub use qa_tables::{code_table_preset, mask_preset};
pub use period::{enumerate_periods, select_for_period, Period, PeriodUnit};
pub use composite::{
    CompositeOutput, CompositeResult, CompositorParams, ReductionRule, RegionStatParams,
    TemporalCompositor,
};
pub use coverage::{
    combined_fraction, coverage_series, fraction, overlap_area, region_table, CoverageRecord, Region,
    RegionStatRecord, RegionStatistic, RegionTable, Sample,
};
pub use band_math::{BandOp, SpectralIndex};
pub use pipeline::{CompositeMethod, CompositePipeline, MaskRuleConfig, PipelineConfig};
