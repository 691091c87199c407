use crate::types::{MosaicError, MosaicResult, Raster};
use chrono::{DateTime, Datelike, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Calendar length of one composite period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodUnit {
    Day,
    Month,
}

impl fmt::Display for PeriodUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodUnit::Day => write!(f, "day"),
            PeriodUnit::Month => write!(f, "month"),
        }
    }
}

impl FromStr for PeriodUnit {
    type Err = MosaicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" => Ok(PeriodUnit::Day),
            "month" => Ok(PeriodUnit::Month),
            _ => Err(MosaicError::InvalidParameter(format!(
                "Invalid period unit: {}",
                s
            ))),
        }
    }
}

/// Advance `t` by `n` calendar units.
///
/// Days are exact 24 hour steps in UTC. Months use calendar arithmetic and clamp
/// to the last day of the target month (Jan 31 + 1 month = Feb 28/29).
pub fn advance(t: DateTime<Utc>, unit: PeriodUnit, n: u32) -> MosaicResult<DateTime<Utc>> {
    let advanced = match unit {
        PeriodUnit::Day => t.checked_add_signed(Duration::days(i64::from(n))),
        PeriodUnit::Month => t.checked_add_months(Months::new(n)),
    };
    advanced.ok_or_else(|| {
        MosaicError::InvalidParameter(format!("{} advanced by {} {}s is out of range", t, n, unit))
    })
}

/// Half-open time window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }

    /// Calendar date of the period start, `YYYY-MM-DD`
    pub fn label(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }
}

/// Periods covering `[series_start, series_end)`.
///
/// Every boundary is computed from `series_start` directly, so month-end clamping
/// never drifts across periods. The last period may extend past `series_end`;
/// rasters at or after `series_end` are excluded by [`select_in_range`].
pub fn enumerate_periods(
    series_start: DateTime<Utc>,
    series_end: DateTime<Utc>,
    unit: PeriodUnit,
) -> MosaicResult<Vec<Period>> {
    let mut periods = Vec::new();
    if series_end <= series_start {
        log::debug!("Empty period range {} .. {}", series_start, series_end);
        return Ok(periods);
    }

    let mut n = 0u32;
    let mut start = series_start;
    while start < series_end {
        let end = advance(series_start, unit, n + 1)?;
        periods.push(Period { start, end });
        n += 1;
        start = end;
    }

    log::debug!(
        "Enumerated {} {} periods from {} to {}",
        periods.len(),
        unit,
        series_start,
        series_end
    );
    Ok(periods)
}

/// Rasters whose timestamp falls inside `period`, in input order
pub fn select_for_period<'a>(series: &'a [Raster], period: &Period) -> Vec<&'a Raster> {
    series.iter().filter(|r| period.contains(r.timestamp)).collect()
}

/// Like [`select_for_period`] but also clipped to `series_end`
pub fn select_in_range<'a>(
    series: &'a [Raster],
    period: &Period,
    series_end: DateTime<Utc>,
) -> Vec<&'a Raster> {
    series
        .iter()
        .filter(|r| period.contains(r.timestamp) && r.timestamp < series_end)
        .collect()
}

/// Periods in `[series_start, series_end)` holding at least one raster
pub fn occupied_periods(
    series: &[Raster],
    series_start: DateTime<Utc>,
    series_end: DateTime<Utc>,
    unit: PeriodUnit,
) -> MosaicResult<Vec<Period>> {
    Ok(enumerate_periods(series_start, series_end, unit)?
        .into_iter()
        .filter(|p| !select_in_range(series, p, series_end).is_empty())
        .collect())
}

/// Acquisition date as a `YYYYMMDD` number
pub fn date_number(t: DateTime<Utc>) -> u32 {
    t.year() as u32 * 10_000 + t.month() * 100 + t.day()
}

/// Number of rasters per acquisition date (`YYYYMMDD`)
pub fn acquisition_histogram(series: &[Raster]) -> BTreeMap<u32, usize> {
    let mut histogram = BTreeMap::new();
    for raster in series {
        *histogram.entry(date_number(raster.timestamp)).or_insert(0) += 1;
    }
    histogram
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_day_period_count() {
        let periods = enumerate_periods(ymd(2020, 1, 1), ymd(2020, 1, 11), PeriodUnit::Day).unwrap();
        assert_eq!(periods.len(), 10);
        assert_eq!(periods[9].end, ymd(2020, 1, 11));
        for pair in periods.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_empty_range() {
        assert!(enumerate_periods(ymd(2020, 2, 1), ymd(2020, 1, 1), PeriodUnit::Day)
            .unwrap()
            .is_empty());
        assert!(enumerate_periods(ymd(2020, 1, 1), ymd(2020, 1, 1), PeriodUnit::Month)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_partial_unit_rounds_up() {
        let end = ymd(2020, 3, 15);
        let periods = enumerate_periods(ymd(2020, 1, 1), end, PeriodUnit::Month).unwrap();
        assert_eq!(periods.len(), 3);
        assert_eq!(periods[2].start, ymd(2020, 3, 1));
    }

    #[test]
    fn test_month_end_clamping() {
        let periods = enumerate_periods(ymd(2020, 1, 31), ymd(2020, 4, 30), PeriodUnit::Month).unwrap();
        assert_eq!(periods[0].end, ymd(2020, 2, 29));
        // computed from the series start, not chained from Feb 29
        assert_eq!(periods[1].end, ymd(2020, 3, 31));
        assert_eq!(periods[2].end, ymd(2020, 4, 30));
        assert_eq!(periods.len(), 3);
    }

    #[test]
    fn test_labels_and_dates() {
        let period = Period {
            start: ymd(2020, 2, 1),
            end: ymd(2020, 3, 1),
        };
        assert_eq!(period.label(), "2020-02-01");
        assert_eq!(date_number(ymd(2019, 12, 5)), 20191205);
        assert!(period.contains(ymd(2020, 2, 29)));
        assert!(!period.contains(ymd(2020, 3, 1)));
    }

    #[test]
    fn test_unit_parsing() {
        assert_eq!("Month".parse::<PeriodUnit>().unwrap(), PeriodUnit::Month);
        assert!("week".parse::<PeriodUnit>().is_err());
    }
}
