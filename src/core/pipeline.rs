use super::composite::{CompositeResult, CompositorParams, ReductionRule, TemporalCompositor};
use super::period::PeriodUnit;
use super::qa_mask::{mask_with_rules, MaskRule, QaCodeTable};
use super::qa_tables::mask_preset;
use crate::io::ResultSink;
use crate::types::{MosaicResult, Raster};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-pixel compositing method selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeMethod {
    LatestMosaic,
    Median,
}

impl From<CompositeMethod> for ReductionRule {
    fn from(method: CompositeMethod) -> Self {
        match method {
            CompositeMethod::LatestMosaic => ReductionRule::LatestMosaic,
            CompositeMethod::Median => ReductionRule::Median,
        }
    }
}

/// Cloud-mask source in a pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskRuleConfig {
    /// Named rule set, e.g. "landsat8_cloud"
    Preset(String),
    /// Inline code table with the conditions to exclude
    Inline {
        table: QaCodeTable,
        excluded: Vec<String>,
    },
}

/// Serializable description of a full mask-and-composite run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub period_unit: PeriodUnit,
    pub series_start: DateTime<Utc>,
    pub series_end: DateTime<Utc>,
    pub method: CompositeMethod,
    #[serde(default)]
    pub mask_rules: Vec<MaskRuleConfig>,
}

impl PipelineConfig {
    /// Resolve presets and inline tables into mask rules
    pub fn resolve_mask_rules(&self) -> MosaicResult<Vec<MaskRule>> {
        let mut rules = Vec::new();
        for config in &self.mask_rules {
            match config {
                MaskRuleConfig::Preset(name) => rules.extend(mask_preset(name)?),
                MaskRuleConfig::Inline { table, excluded } => rules.push(MaskRule {
                    table: table.clone(),
                    excluded: excluded.clone(),
                }),
            }
        }
        Ok(rules)
    }
}

/// Mask every raster, composite by period and hand the results to a sink
pub struct CompositePipeline {
    mask_rules: Vec<MaskRule>,
    compositor: TemporalCompositor,
}

impl CompositePipeline {
    pub fn new(mask_rules: Vec<MaskRule>, compositor: TemporalCompositor) -> Self {
        Self {
            mask_rules,
            compositor,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> MosaicResult<Self> {
        let compositor = TemporalCompositor::with_params(CompositorParams {
            period_unit: config.period_unit,
            ..CompositorParams::default()
        });
        Ok(Self::new(config.resolve_mask_rules()?, compositor))
    }

    /// Apply the mask rules to each raster, returning new rasters
    pub fn mask_series(&self, series: &[Raster]) -> MosaicResult<Vec<Raster>> {
        if self.mask_rules.is_empty() {
            return Ok(series.to_vec());
        }
        log::info!(
            "Masking {} rasters with {} QA rules",
            series.len(),
            self.mask_rules.len()
        );
        series
            .iter()
            .map(|raster| mask_with_rules(raster, &self.mask_rules))
            .collect()
    }

    /// Mask and composite without writing anywhere
    pub fn composite(
        &self,
        series: &[Raster],
        series_start: DateTime<Utc>,
        series_end: DateTime<Utc>,
        rule: &ReductionRule,
    ) -> MosaicResult<Vec<CompositeResult>> {
        let masked = self.mask_series(series)?;
        self.compositor.composite(&masked, series_start, series_end, rule)
    }

    /// Full run; returns the number of composites written to `sink`
    pub fn run(
        &self,
        series: &[Raster],
        series_start: DateTime<Utc>,
        series_end: DateTime<Utc>,
        rule: &ReductionRule,
        sink: &mut dyn ResultSink,
    ) -> MosaicResult<usize> {
        let results = self.composite(series, series_start, series_end, rule)?;
        sink.write_composites(&results)?;
        Ok(results.len())
    }

    /// Run with the period range and method of `config`
    pub fn run_config(
        config: &PipelineConfig,
        series: &[Raster],
        sink: &mut dyn ResultSink,
    ) -> MosaicResult<usize> {
        let pipeline = Self::from_config(config)?;
        pipeline.run(
            series,
            config.series_start,
            config.series_end,
            &ReductionRule::from(config.method),
            sink,
        )
    }
}
