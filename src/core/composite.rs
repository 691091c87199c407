use super::coverage::{period_region_stats, Region, RegionStatRecord, RegionStatistic};
use super::period::{enumerate_periods, select_in_range, Period, PeriodUnit};
use crate::types::{Band, Mask, MosaicError, MosaicResult, Raster};
use chrono::{DateTime, Utc};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Region statistic parameters for [`ReductionRule::WeightedRegionStat`]
#[derive(Debug, Clone)]
pub struct RegionStatParams {
    pub stat: RegionStatistic,
    pub regions: Vec<Region>,
    pub band: String,
    /// Sampling scale in ground units
    pub scale: f64,
}

/// How the rasters of one period are reduced
#[derive(Debug, Clone)]
pub enum ReductionRule {
    /// Most recent valid observation per pixel
    LatestMosaic,
    /// Median of the valid observations per pixel
    Median,
    /// One area-weighted statistic per (raster, region)
    WeightedRegionStat(RegionStatParams),
}

impl ReductionRule {
    fn name(&self) -> &'static str {
        match self {
            ReductionRule::LatestMosaic => "latest mosaic",
            ReductionRule::Median => "median",
            ReductionRule::WeightedRegionStat(_) => "weighted region statistic",
        }
    }
}

/// Compositing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositorParams {
    /// Calendar length of each period
    pub period_unit: PeriodUnit,
    /// Reduce independent periods on the rayon pool
    pub parallel: bool,
}

impl Default for CompositorParams {
    fn default() -> Self {
        Self {
            period_unit: PeriodUnit::Month,
            parallel: cfg!(feature = "parallel"),
        }
    }
}

/// Reduced output of one period
#[derive(Debug, Clone)]
pub enum CompositeOutput {
    Raster(Raster),
    Records(Vec<RegionStatRecord>),
}

/// One emitted period
#[derive(Debug, Clone)]
pub struct CompositeResult {
    pub period: Period,
    /// Period start as `YYYY-MM-DD`
    pub date: String,
    pub time_start_millis: i64,
    /// Number of rasters that fell in the period
    pub source_count: usize,
    pub output: CompositeOutput,
}

impl CompositeResult {
    /// Bands of a raster output; 0 for record outputs
    pub fn band_count(&self) -> usize {
        match &self.output {
            CompositeOutput::Raster(r) => r.band_count(),
            CompositeOutput::Records(_) => 0,
        }
    }

    pub fn raster(&self) -> Option<&Raster> {
        match &self.output {
            CompositeOutput::Raster(r) => Some(r),
            CompositeOutput::Records(_) => None,
        }
    }

    pub fn records(&self) -> Option<&[RegionStatRecord]> {
        match &self.output {
            CompositeOutput::Raster(_) => None,
            CompositeOutput::Records(r) => Some(r),
        }
    }
}

/// Tag a reduced period; empty reductions are dropped
pub fn emit(period: &Period, source_count: usize, output: CompositeOutput) -> Option<CompositeResult> {
    let empty = match &output {
        CompositeOutput::Raster(r) => r.band_count() == 0,
        CompositeOutput::Records(r) => r.is_empty(),
    };
    if source_count == 0 || empty {
        log::debug!("Dropping empty period {}", period.label());
        return None;
    }

    Some(CompositeResult {
        period: *period,
        date: period.label(),
        time_start_millis: period.start_millis(),
        source_count,
        output,
    })
}

/// Temporal compositor: buckets a series into calendar periods and reduces each one
pub struct TemporalCompositor {
    params: CompositorParams,
}

impl TemporalCompositor {
    /// Create a monthly compositor with default parameters
    pub fn new() -> Self {
        Self {
            params: CompositorParams::default(),
        }
    }

    pub fn with_params(params: CompositorParams) -> Self {
        Self { params }
    }

    pub fn with_unit(unit: PeriodUnit) -> Self {
        Self::with_params(CompositorParams {
            period_unit: unit,
            ..CompositorParams::default()
        })
    }

    pub fn params(&self) -> &CompositorParams {
        &self.params
    }

    /// Composite `series` over `[series_start, series_end)`.
    ///
    /// Results are in chronological order; periods without rasters are skipped.
    pub fn composite(
        &self,
        series: &[Raster],
        series_start: DateTime<Utc>,
        series_end: DateTime<Utc>,
        rule: &ReductionRule,
    ) -> MosaicResult<Vec<CompositeResult>> {
        log::info!(
            "Compositing {} rasters into {} periods with {}",
            series.len(),
            self.params.period_unit,
            rule.name()
        );

        let periods = enumerate_periods(series_start, series_end, self.params.period_unit)?;
        let run_period = |period: &Period| -> MosaicResult<Option<CompositeResult>> {
            let selected = select_in_range(series, period, series_end);
            if selected.is_empty() {
                return Ok(None);
            }
            log::debug!("Period {}: {} rasters", period.label(), selected.len());
            let output = reduce(period, &selected, rule)?;
            Ok(emit(period, selected.len(), output))
        };

        let reduced: Vec<Option<CompositeResult>> = if self.params.parallel {
            self.run_parallel(&periods, run_period)?
        } else {
            periods.iter().map(run_period).collect::<MosaicResult<_>>()?
        };

        let results: Vec<CompositeResult> = reduced.into_iter().flatten().collect();
        log::info!(
            "Compositing completed: {} of {} periods emitted",
            results.len(),
            periods.len()
        );
        Ok(results)
    }

    #[cfg(feature = "parallel")]
    fn run_parallel<F>(&self, periods: &[Period], run_period: F) -> MosaicResult<Vec<Option<CompositeResult>>>
    where
        F: Fn(&Period) -> MosaicResult<Option<CompositeResult>> + Sync + Send,
    {
        use rayon::prelude::*;
        // indexed collect keeps chronological order
        periods.par_iter().map(run_period).collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn run_parallel<F>(&self, periods: &[Period], run_period: F) -> MosaicResult<Vec<Option<CompositeResult>>>
    where
        F: Fn(&Period) -> MosaicResult<Option<CompositeResult>>,
    {
        periods.iter().map(run_period).collect()
    }
}

impl Default for TemporalCompositor {
    fn default() -> Self {
        Self::new()
    }
}

/// Reduce the rasters selected for `period` with `rule`
pub fn reduce(period: &Period, rasters: &[&Raster], rule: &ReductionRule) -> MosaicResult<CompositeOutput> {
    match rule {
        ReductionRule::LatestMosaic => Ok(CompositeOutput::Raster(latest_mosaic(period, rasters)?)),
        ReductionRule::Median => Ok(CompositeOutput::Raster(median_composite(period, rasters)?)),
        ReductionRule::WeightedRegionStat(p) => Ok(CompositeOutput::Records(period_region_stats(
            period, rasters, &p.band, &p.regions, p.stat, p.scale,
        )?)),
    }
}

/// Check that every raster shares the first raster's grid and carries its bands
fn check_stack(rasters: &[&Raster]) -> MosaicResult<Vec<String>> {
    let Some(first) = rasters.first() else {
        return Ok(Vec::new());
    };
    let names = first.band_names();

    for raster in &rasters[1..] {
        if raster.dim() != first.dim() {
            return Err(MosaicError::DimensionMismatch {
                expected: first.dim(),
                found: raster.dim(),
                context: format!("raster '{}' in composite stack", raster.id),
            });
        }
        for name in &names {
            raster.band(name)?;
        }
    }
    Ok(names)
}

fn output_raster(period: &Period, template: &Raster) -> Raster {
    Raster::new(period.label(), period.start, template.geo_transform)
}

/// Per-pixel value of the last raster (by timestamp) holding a valid observation.
///
/// Rasters with identical timestamps keep their input order, so the later
/// input wins. Pixels without any valid observation are masked and NaN.
pub fn latest_mosaic(period: &Period, rasters: &[&Raster]) -> MosaicResult<Raster> {
    let names = check_stack(rasters)?;
    let Some(first) = rasters.first() else {
        return Ok(Raster::new(period.label(), period.start, Default::default()));
    };

    let mut ordered: Vec<&Raster> = rasters.to_vec();
    ordered.sort_by_key(|r| r.timestamp);

    let mut out = output_raster(period, first);
    let mut any_valid = Mask::from_elem(first.dim(), false);

    for name in &names {
        let stack: Vec<&Band> = ordered.iter().map(|r| r.band(name)).collect::<MosaicResult<_>>()?;
        let mut values = Band::from_elem(first.dim(), f64::NAN);

        Zip::indexed(&mut values).and(&mut any_valid).for_each(|(row, col), value, valid| {
            for (raster, band) in ordered.iter().zip(&stack).rev() {
                let v = band[[row, col]];
                if raster.is_unmasked(row, col) && v.is_finite() {
                    *value = v;
                    *valid = true;
                    break;
                }
            }
        });
        out = out.with_band(name.clone(), values)?;
    }

    if names.is_empty() {
        return Ok(out);
    }
    out.with_mask(any_valid)
}

/// Median of a sample set; even counts average the two middle samples
pub fn median(samples: &mut [f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(|a, b| a.total_cmp(b));
    let mid = samples.len() / 2;
    if samples.len() % 2 == 0 {
        Some((samples[mid - 1] + samples[mid]) / 2.0)
    } else {
        Some(samples[mid])
    }
}

/// Per-pixel median of every valid observation in the period
pub fn median_composite(period: &Period, rasters: &[&Raster]) -> MosaicResult<Raster> {
    let names = check_stack(rasters)?;
    let Some(first) = rasters.first() else {
        return Ok(Raster::new(period.label(), period.start, Default::default()));
    };

    let mut out = output_raster(period, first);
    let mut any_valid = Mask::from_elem(first.dim(), false);

    for name in &names {
        let stack: Vec<&Band> = rasters.iter().map(|r| r.band(name)).collect::<MosaicResult<_>>()?;
        let mut values = Band::from_elem(first.dim(), f64::NAN);

        let pixel = |row: usize, col: usize| -> Option<f64> {
            let mut samples: Vec<f64> = rasters
                .iter()
                .zip(&stack)
                .filter(|(raster, _)| raster.is_unmasked(row, col))
                .map(|(_, band)| band[[row, col]])
                .filter(|v| v.is_finite())
                .collect();
            median(&mut samples)
        };

        #[cfg(feature = "parallel")]
        Zip::indexed(&mut values).and(&mut any_valid).par_for_each(|(row, col), value, valid| {
            if let Some(m) = pixel(row, col) {
                *value = m;
                *valid = true;
            }
        });

        #[cfg(not(feature = "parallel"))]
        Zip::indexed(&mut values).and(&mut any_valid).for_each(|(row, col), value, valid| {
            if let Some(m) = pixel(row, col) {
                *value = m;
                *valid = true;
            }
        });

        out = out.with_band(name.clone(), values)?;
    }

    if names.is_empty() {
        return Ok(out);
    }
    out.with_mask(any_valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoTransform;
    use chrono::TimeZone;
    use ndarray::array;

    fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn scene(id: &str, t: DateTime<Utc>, values: Band, mask: Option<Mask>) -> Raster {
        let raster = Raster::new(id, t, GeoTransform::default()).with_band("B1", values).unwrap();
        match mask {
            Some(m) => raster.with_mask(m).unwrap(),
            None => raster,
        }
    }

    fn january() -> Period {
        Period {
            start: ymd(2020, 1, 1),
            end: ymd(2020, 2, 1),
        }
    }

    #[test]
    fn test_latest_wins() {
        let r1 = scene("r1", ymd(2020, 1, 5), array![[1.0, 1.0]], None);
        let r2 = scene("r2", ymd(2020, 1, 20), array![[2.0, 2.0]], Some(array![[true, false]]));

        // input order must not matter
        let out = latest_mosaic(&january(), &[&r2, &r1]).unwrap();
        assert_eq!(out.band("B1").unwrap(), &array![[2.0, 1.0]]);
        assert_eq!(out.id, "2020-01-01");
    }

    #[test]
    fn test_latest_tie_keeps_input_order() {
        let t = ymd(2020, 1, 5);
        let a = scene("a", t, array![[1.0]], None);
        let b = scene("b", t, array![[2.0]], None);
        let out = latest_mosaic(&january(), &[&a, &b]).unwrap();
        assert_eq!(out.band("B1").unwrap()[[0, 0]], 2.0);
    }

    #[test]
    fn test_latest_no_valid_pixel_is_missing() {
        let r = scene("r", ymd(2020, 1, 5), array![[1.0, 3.0]], Some(array![[false, true]]));
        let out = latest_mosaic(&january(), &[&r]).unwrap();
        assert!(out.band("B1").unwrap()[[0, 0]].is_nan());
        assert_eq!(out.mask().unwrap(), &array![[false, true]]);
    }

    #[test]
    fn test_median_ignores_masked_samples() {
        let r1 = scene("r1", ymd(2020, 1, 2), array![[1.0]], None);
        let r2 = scene("r2", ymd(2020, 1, 3), array![[100.0]], Some(array![[false]]));
        let r3 = scene("r3", ymd(2020, 1, 4), array![[3.0]], None);
        let r4 = scene("r4", ymd(2020, 1, 5), array![[5.0]], None);
        let out = median_composite(&january(), &[&r1, &r2, &r3, &r4]).unwrap();
        assert_eq!(out.band("B1").unwrap()[[0, 0]], 3.0);
    }

    #[test]
    fn test_median_even_count_averages() {
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_missing_band_in_stack() {
        let r1 = scene("r1", ymd(2020, 1, 2), array![[1.0]], None);
        let r2 = Raster::new("r2", ymd(2020, 1, 3), GeoTransform::default())
            .with_band("B2", array![[1.0]])
            .unwrap();
        let result = median_composite(&january(), &[&r1, &r2]);
        assert!(matches!(result, Err(MosaicError::MissingBand { raster, .. }) if raster == "r2"));
    }

    #[test]
    fn test_emit_drops_empty() {
        let empty = Raster::new("x", ymd(2020, 1, 1), GeoTransform::default());
        assert!(emit(&january(), 1, CompositeOutput::Raster(empty)).is_none());
        assert!(emit(&january(), 0, CompositeOutput::Records(vec![])).is_none());
    }

    #[test]
    fn test_median_of_single_raster_is_identity() {
        let values = array![[1.5, -2.0, 7.25], [0.0, f64::NAN, 3.0]];
        let mask = array![[true, true, false], [true, true, true]];
        let r = scene("only", ymd(2020, 1, 9), values.clone(), Some(mask));

        let out = match reduce(&january(), &[&r], &ReductionRule::Median).unwrap() {
            CompositeOutput::Raster(raster) => raster,
            CompositeOutput::Records(_) => panic!("median must produce a raster"),
        };
        let band = out.band("B1").unwrap();
        for ((row, col), &v) in values.indexed_iter() {
            if r.is_unmasked(row, col) && v.is_finite() {
                assert_eq!(band[[row, col]], v);
                assert!(out.is_unmasked(row, col));
            } else {
                assert!(band[[row, col]].is_nan());
                assert!(!out.is_unmasked(row, col));
            }
        }
    }
}
