//! Area-weighted fractional coverage and region statistics.
//!
//! Regions are sampled on a grid of `scale`-sized cells aligned to the
//! coordinate origin. Every cell touching the polygon becomes one sample: it
//! reads the raster pixel under the cell centre and is weighted by the area of
//! the cell that lies inside the polygon, so the weights of a region sum to its
//! true area whatever its alignment to the grid.

use super::period::Period;
use crate::types::{Band, MosaicError, MosaicResult, Raster};
use geo::{Area, BooleanOps, BoundingRect, Centroid, MultiPolygon, Polygon, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named polygon in the rasters' projected coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: String,
    pub geometry: Polygon<f64>,
}

/// One grid cell of a region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Cell centre
    pub x: f64,
    pub y: f64,
    /// Area of the cell inside the region
    pub weight: f64,
}

impl Region {
    pub fn new(name: impl Into<String>, geometry: Polygon<f64>) -> Self {
        Self {
            name: name.into(),
            geometry,
        }
    }

    /// Axis-aligned rectangle region
    pub fn rectangle(name: impl Into<String>, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        let geometry = Polygon::new(
            vec![
                (min_x, min_y),
                (max_x, min_y),
                (max_x, max_y),
                (min_x, max_y),
                (min_x, min_y),
            ]
            .into(),
            vec![],
        );
        Self::new(name, geometry)
    }

    /// True geometric area
    pub fn area(&self) -> f64 {
        self.geometry.unsigned_area()
    }

    /// Area of the region, failing with `ZeroAreaRegion` for degenerate geometry
    pub fn checked_area(&self) -> MosaicResult<f64> {
        let area = self.area();
        if area > 0.0 && area.is_finite() {
            Ok(area)
        } else {
            Err(MosaicError::ZeroAreaRegion(self.name.clone()))
        }
    }

    /// Centroid (x, y); `None` for empty geometry
    pub fn centroid(&self) -> Option<(f64, f64)> {
        self.geometry.centroid().map(|p| (p.x(), p.y()))
    }

    /// Area-weighted cells at `scale` covering the region
    pub fn sample_points(&self, scale: f64) -> Vec<Sample> {
        cell_samples(&self.geometry, scale)
    }
}

fn cell_samples(geometry: &Polygon<f64>, scale: f64) -> Vec<Sample> {
    let Some(rect) = geometry.bounding_rect() else {
        return Vec::new();
    };

    let col_start = (rect.min().x / scale).floor() as i64;
    let col_end = (rect.max().x / scale).ceil() as i64;
    let row_start = (rect.min().y / scale).floor() as i64;
    let row_end = (rect.max().y / scale).ceil() as i64;

    let mut samples = Vec::new();
    for i in row_start..row_end {
        let y0 = i as f64 * scale;
        for j in col_start..col_end {
            let x0 = j as f64 * scale;
            let cell = Rect::new((x0, y0), (x0 + scale, y0 + scale)).to_polygon();
            let weight = geometry.intersection(&cell).unsigned_area();
            if weight > 0.0 {
                samples.push(Sample {
                    x: x0 + scale / 2.0,
                    y: y0 + scale / 2.0,
                    weight,
                });
            }
        }
    }
    samples
}

/// Statistic computed over the valid samples of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionStatistic {
    /// Sum of values, each weighted by the fraction of its cell inside the region
    Sum,
    /// Area-weighted mean
    Mean,
    /// Valid area in units of whole cells
    Count,
}

impl RegionStatistic {
    pub fn name(&self) -> &'static str {
        match self {
            RegionStatistic::Sum => "sum",
            RegionStatistic::Mean => "mean",
            RegionStatistic::Count => "count",
        }
    }
}

/// One (raster, region) reduction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionStatRecord {
    pub image_id: String,
    pub image_date: String,
    pub region: String,
    pub statistic: RegionStatistic,
    /// Statistic over valid samples
    pub value: f64,
    /// Fraction of the region's area covered by valid samples
    pub coverage: f64,
    /// `value` scaled by `coverage`
    pub weighted: f64,
    pub valid_samples: usize,
}

/// Fraction of one raster's coverage of one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRecord {
    pub image_id: String,
    pub image_date: String,
    pub region: String,
    pub fraction: f64,
}

fn check_scale(scale: f64) -> MosaicResult<()> {
    if scale > 0.0 && scale.is_finite() {
        Ok(())
    } else {
        Err(MosaicError::InvalidParameter(format!(
            "Sampling scale must be positive, got {}",
            scale
        )))
    }
}

/// Band value at world point (x, y) if the covering pixel is valid
fn sample_value(raster: &Raster, band: &Band, x: f64, y: f64) -> Option<f64> {
    let (row, col) = raster.geo_transform.world_to_pixel(x, y, raster.dim())?;
    let value = band[[row, col]];
    if raster.is_unmasked(row, col) && value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Valid samples of one region in one raster
#[derive(Debug, Default)]
struct Tally {
    valid_area: f64,
    weighted_sum: f64,
    valid_samples: usize,
}

impl Tally {
    fn of(raster: &Raster, band: &Band, samples: &[Sample]) -> Self {
        let mut tally = Tally::default();
        for s in samples {
            if let Some(v) = sample_value(raster, band, s.x, s.y) {
                tally.valid_area += s.weight;
                tally.weighted_sum += v * s.weight;
                tally.valid_samples += 1;
            }
        }
        tally
    }

    fn coverage(&self, area: f64) -> f64 {
        // float noise from the cell intersections
        (self.valid_area / area).clamp(0.0, 1.0)
    }
}

/// Fraction of `region`'s area covered by valid pixels of `band`, in `[0, 1]`.
pub fn fraction(raster: &Raster, band: &str, region: &Region, scale: f64) -> MosaicResult<f64> {
    check_scale(scale)?;
    let data = raster.band(band)?;
    let area = region.checked_area()?;
    Ok(Tally::of(raster, data, &region.sample_points(scale)).coverage(area))
}

/// Reduce `band` over `region` with `stat`.
///
/// Returns `None` when the statistic is undefined (a mean over no valid samples).
pub fn region_stat(
    raster: &Raster,
    band: &str,
    region: &Region,
    stat: RegionStatistic,
    scale: f64,
) -> MosaicResult<Option<RegionStatRecord>> {
    check_scale(scale)?;
    let data = raster.band(band)?;
    let area = region.checked_area()?;
    let tally = Tally::of(raster, data, &region.sample_points(scale));
    Ok(build_record(raster, region, stat, &tally, area, scale))
}

fn build_record(
    raster: &Raster,
    region: &Region,
    stat: RegionStatistic,
    tally: &Tally,
    area: f64,
    scale: f64,
) -> Option<RegionStatRecord> {
    let cell_area = scale * scale;
    let value = match stat {
        RegionStatistic::Sum => tally.weighted_sum / cell_area,
        RegionStatistic::Count => tally.valid_area / cell_area,
        RegionStatistic::Mean => {
            if tally.valid_area <= 0.0 {
                return None;
            }
            tally.weighted_sum / tally.valid_area
        }
    };
    let coverage = tally.coverage(area);

    Some(RegionStatRecord {
        image_id: raster.id.clone(),
        image_date: raster.timestamp.format("%Y-%m-%d").to_string(),
        region: region.name.clone(),
        statistic: stat,
        value,
        coverage,
        weighted: value * coverage,
        valid_samples: tally.valid_samples,
    })
}

/// Union of every region's geometry
fn union_of(regions: &[Region]) -> MultiPolygon<f64> {
    let mut iter = regions.iter();
    let Some(first) = iter.next() else {
        return MultiPolygon::new(Vec::new());
    };
    iter.fold(MultiPolygon::new(vec![first.geometry.clone()]), |acc, region| {
        acc.union(&MultiPolygon::new(vec![region.geometry.clone()]))
    })
}

/// Area shared by two or more regions
pub fn overlap_area(regions: &[Region]) -> f64 {
    let total: f64 = regions.iter().map(Region::area).sum();
    (total - union_of(regions).unsigned_area()).max(0.0)
}

/// Warn when per-region values of `regions` would double count if summed
fn warn_on_overlap(regions: &[Region]) {
    let shared = overlap_area(regions);
    let total: f64 = regions.iter().map(Region::area).sum();
    if shared > total * 1e-9 {
        log::warn!(
            "Regions overlap by {:.1} area units; per-region values include the shared area, \
             use combined_fraction for a deduplicated total",
            shared
        );
    }
}

fn region_samples(regions: &[Region], scale: f64) -> MosaicResult<Vec<Vec<Sample>>> {
    regions
        .iter()
        .map(|region| {
            region.checked_area()?;
            Ok(region.sample_points(scale))
        })
        .collect()
}

/// Fraction of the union of `regions` covered by valid pixels.
///
/// Area shared by several regions counts once, so the result stays a true
/// fraction of the combined footprint.
pub fn combined_fraction(raster: &Raster, band: &str, regions: &[Region], scale: f64) -> MosaicResult<f64> {
    check_scale(scale)?;
    let data = raster.band(band)?;
    for region in regions {
        region.checked_area()?;
    }

    let union = union_of(regions);
    let area = union.unsigned_area();
    if area <= 0.0 {
        return Err(MosaicError::ZeroAreaRegion("union of regions".to_string()));
    }

    // union parts are disjoint, so their cell weights add up to the union area
    let samples: Vec<Sample> = union.0.iter().flat_map(|p| cell_samples(p, scale)).collect();
    Ok(Tally::of(raster, data, &samples).coverage(area))
}

/// Coverage fraction of every region by every raster of a series.
///
/// Each region is reduced over its whole footprint; see [`combined_fraction`]
/// for a total over overlapping regions.
pub fn coverage_series(
    series: &[Raster],
    band: &str,
    regions: &[Region],
    scale: f64,
) -> MosaicResult<Vec<CoverageRecord>> {
    check_scale(scale)?;
    log::info!(
        "Computing coverage of {} regions over {} rasters at scale {}",
        regions.len(),
        series.len(),
        scale
    );

    let samples = region_samples(regions, scale)?;
    warn_on_overlap(regions);
    let mut records = Vec::with_capacity(series.len() * regions.len());

    for raster in series {
        let data = raster.band(band)?;
        for (region, cells) in regions.iter().zip(&samples) {
            records.push(CoverageRecord {
                image_id: raster.id.clone(),
                image_date: raster.timestamp.format("%Y-%m-%d").to_string(),
                region: region.name.clone(),
                fraction: Tally::of(raster, data, cells).coverage(region.area()),
            });
        }
    }

    Ok(records)
}

/// Region statistics for every (raster, region) pair of a series
pub fn region_stats(
    series: &[&Raster],
    band: &str,
    regions: &[Region],
    stat: RegionStatistic,
    scale: f64,
) -> MosaicResult<Vec<RegionStatRecord>> {
    check_scale(scale)?;
    let samples = region_samples(regions, scale)?;
    warn_on_overlap(regions);
    let mut records = Vec::new();

    for raster in series {
        let data = raster.band(band)?;
        for (region, cells) in regions.iter().zip(&samples) {
            let tally = Tally::of(raster, data, cells);
            match build_record(raster, region, stat, &tally, region.area(), scale) {
                Some(record) => records.push(record),
                None => log::debug!(
                    "No valid samples for region '{}' in raster '{}'",
                    region.name,
                    raster.id
                ),
            }
        }
    }

    Ok(records)
}

/// One row of a region table: a raster and its value per region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionTableRow {
    pub image_id: String,
    pub image_date: String,
    pub values: BTreeMap<String, f64>,
}

/// Time series table with one row per raster and one column per region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionTable {
    pub statistic: RegionStatistic,
    pub columns: Vec<String>,
    pub rows: Vec<RegionTableRow>,
}

impl RegionTable {
    /// Pivot records into rows keyed by image, preserving first-seen row order
    pub fn from_records(
        statistic: RegionStatistic,
        columns: Vec<String>,
        records: &[RegionStatRecord],
    ) -> Self {
        let mut rows: Vec<RegionTableRow> = Vec::new();
        for record in records {
            let row = match rows.iter().position(|r| r.image_id == record.image_id) {
                Some(i) => &mut rows[i],
                None => {
                    rows.push(RegionTableRow {
                        image_id: record.image_id.clone(),
                        image_date: record.image_date.clone(),
                        values: BTreeMap::new(),
                    });
                    let last = rows.len() - 1;
                    &mut rows[last]
                }
            };
            row.values.insert(record.region.clone(), record.value);
        }
        Self {
            statistic,
            columns,
            rows,
        }
    }

    pub fn value(&self, image_id: &str, region: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|r| r.image_id == image_id)
            .and_then(|r| r.values.get(region).copied())
    }
}

/// Reduce a series into a region table (one row per raster, one column per region)
pub fn region_table(
    series: &[Raster],
    band: &str,
    regions: &[Region],
    stat: RegionStatistic,
    scale: f64,
) -> MosaicResult<RegionTable> {
    log::info!(
        "Building {} region table for band '{}' over {} rasters",
        stat.name(),
        band,
        series.len()
    );
    let refs: Vec<&Raster> = series.iter().collect();
    let records = region_stats(&refs, band, regions, stat, scale)?;
    let columns = regions.iter().map(|r| r.name.clone()).collect();
    Ok(RegionTable::from_records(stat, columns, &records))
}

/// Region statistics for the rasters of one period
pub(crate) fn period_region_stats(
    period: &Period,
    rasters: &[&Raster],
    band: &str,
    regions: &[Region],
    stat: RegionStatistic,
    scale: f64,
) -> MosaicResult<Vec<RegionStatRecord>> {
    log::debug!(
        "Region {} for period {} over {} rasters",
        stat.name(),
        period.label(),
        rasters.len()
    );
    region_stats(rasters, band, regions, stat, scale)
}
