use approx::assert_abs_diff_eq;
use chrono::{DateTime, TimeZone, Utc};
use ndarray::{array, Array2};
use qamosaic::core::composite::{CompositorParams, ReductionRule, RegionStatParams, TemporalCompositor};
use qamosaic::core::coverage::{Region, RegionStatistic};
use qamosaic::core::period::{enumerate_periods, PeriodUnit};
use qamosaic::types::{GeoTransform, MosaicError, Raster};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn acquisition(id: &str, t: DateTime<Utc>, value: f64, mask: Option<Array2<bool>>) -> Raster {
    let raster = Raster::new(id, t, GeoTransform::north_up(0.0, 60.0, 30.0))
        .with_band("B1", Array2::from_elem((2, 2), value))
        .unwrap();
    match mask {
        Some(m) => raster.with_mask(m).unwrap(),
        None => raster,
    }
}

fn sequential(unit: PeriodUnit) -> TemporalCompositor {
    TemporalCompositor::with_params(CompositorParams {
        period_unit: unit,
        parallel: false,
    })
}

#[test]
fn test_monthly_latest_mosaic() {
    init_logging();

    let series = vec![
        acquisition("jan05", ymd(2020, 1, 5), 1.0, None),
        acquisition("jan20", ymd(2020, 1, 20), 2.0, Some(array![[true, false], [true, true]])),
        acquisition("feb10", ymd(2020, 2, 10), 3.0, None),
    ];

    let results = TemporalCompositor::with_unit(PeriodUnit::Month)
        .composite(&series, ymd(2020, 1, 1), ymd(2020, 3, 1), &ReductionRule::LatestMosaic)
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].date, "2020-01-01");
    assert_eq!(results[0].source_count, 2);
    assert_eq!(results[0].time_start_millis, ymd(2020, 1, 1).timestamp_millis());
    assert_eq!(results[1].date, "2020-02-01");
    assert_eq!(results[1].source_count, 1);

    let january = results[0].raster().unwrap();
    // masked pixel of the later raster falls back to the earlier one
    assert_eq!(january.band("B1").unwrap(), &array![[2.0, 1.0], [2.0, 2.0]]);
    assert_eq!(january.timestamp, ymd(2020, 1, 1));
    assert_eq!(january.valid_pixel_count(), 4);

    let february = results[1].raster().unwrap();
    assert_eq!(february.band("B1").unwrap(), &Array2::from_elem((2, 2), 3.0));
}

#[test]
fn test_median_composite_ignores_invalid_samples() {
    init_logging();

    let mut nan_band = Array2::from_elem((2, 2), 10.0);
    nan_band[[1, 1]] = f64::NAN;
    let nan_raster = Raster::new("nan", ymd(2020, 4, 3), GeoTransform::north_up(0.0, 60.0, 30.0))
        .with_band("B1", nan_band)
        .unwrap();

    let series = vec![
        acquisition("a", ymd(2020, 4, 1), 1.0, None),
        acquisition("b", ymd(2020, 4, 2), 4.0, Some(array![[true, true], [false, true]])),
        nan_raster,
    ];

    let results = sequential(PeriodUnit::Month)
        .composite(&series, ymd(2020, 4, 1), ymd(2020, 5, 1), &ReductionRule::Median)
        .unwrap();
    assert_eq!(results.len(), 1);

    let band = results[0].raster().unwrap().band("B1").unwrap();
    assert_abs_diff_eq!(band[[0, 0]], 4.0);
    // masked sample dropped: median of 1 and 10
    assert_abs_diff_eq!(band[[1, 0]], 5.5);
    // NaN sample dropped: median of 1 and 4
    assert_abs_diff_eq!(band[[1, 1]], 2.5);
}

#[test]
fn test_daily_periods_skip_empty_days() {
    let series = vec![
        acquisition("d1", ymd(2021, 3, 1), 1.0, None),
        acquisition("d3", ymd(2021, 3, 3), 3.0, None),
    ];
    let results = sequential(PeriodUnit::Day)
        .composite(&series, ymd(2021, 3, 1), ymd(2021, 3, 5), &ReductionRule::LatestMosaic)
        .unwrap();

    let dates: Vec<&str> = results.iter().map(|r| r.date.as_str()).collect();
    assert_eq!(dates, vec!["2021-03-01", "2021-03-03"]);
}

#[test]
fn test_parallel_matches_sequential() {
    let series: Vec<Raster> = (1..=28)
        .map(|d| acquisition(&format!("d{}", d), ymd(2019, 2, d), d as f64, None))
        .collect();

    let rule = ReductionRule::Median;
    let start = ymd(2019, 2, 1);
    let end = ymd(2019, 3, 1);

    let parallel = TemporalCompositor::with_params(CompositorParams {
        period_unit: PeriodUnit::Day,
        parallel: true,
    })
    .composite(&series, start, end, &rule)
    .unwrap();
    let serial = sequential(PeriodUnit::Day).composite(&series, start, end, &rule).unwrap();

    assert_eq!(parallel.len(), 28);
    for (p, s) in parallel.iter().zip(&serial) {
        assert_eq!(p.date, s.date);
        assert_eq!(p.raster().unwrap().band("B1").unwrap(), s.raster().unwrap().band("B1").unwrap());
    }
}

#[test]
fn test_empty_range_yields_nothing() {
    let series = vec![acquisition("a", ymd(2020, 1, 5), 1.0, None)];
    let results = sequential(PeriodUnit::Month)
        .composite(&series, ymd(2020, 3, 1), ymd(2020, 1, 1), &ReductionRule::Median)
        .unwrap();
    assert!(results.is_empty());
    assert!(enumerate_periods(ymd(2020, 1, 1), ymd(2020, 1, 1), PeriodUnit::Day)
        .unwrap()
        .is_empty());
}

#[test]
fn test_raster_at_series_end_is_excluded() {
    let series = vec![
        acquisition("in", ymd(2020, 1, 10), 1.0, None),
        acquisition("edge", ymd(2020, 1, 15), 2.0, None),
    ];
    let results = sequential(PeriodUnit::Month)
        .composite(&series, ymd(2020, 1, 1), ymd(2020, 1, 15), &ReductionRule::LatestMosaic)
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source_count, 1);
}

#[test]
fn test_missing_band_in_stack() {
    let other = Raster::new("other", ymd(2020, 1, 9), GeoTransform::north_up(0.0, 60.0, 30.0))
        .with_band("B2", Array2::zeros((2, 2)))
        .unwrap();
    let series = vec![acquisition("a", ymd(2020, 1, 5), 1.0, None), other];

    let err = sequential(PeriodUnit::Month)
        .composite(&series, ymd(2020, 1, 1), ymd(2020, 2, 1), &ReductionRule::LatestMosaic)
        .unwrap_err();
    assert!(matches!(err, MosaicError::MissingBand { .. }));
}

#[test]
fn test_weighted_region_stat_per_period() {
    init_logging();

    let series = vec![
        acquisition("full", ymd(2020, 5, 2), 2.0, None),
        acquisition("half", ymd(2020, 5, 9), 4.0, Some(array![[true, false], [true, false]])),
    ];
    let rule = ReductionRule::WeightedRegionStat(RegionStatParams {
        stat: RegionStatistic::Mean,
        regions: vec![Region::rectangle("field", 0.0, 0.0, 60.0, 60.0)],
        band: "B1".to_string(),
        scale: 30.0,
    });

    let results = sequential(PeriodUnit::Month)
        .composite(&series, ymd(2020, 5, 1), ymd(2020, 6, 1), &rule)
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].band_count(), 0);

    let records = results[0].records().unwrap();
    assert_eq!(records.len(), 2);
    assert_abs_diff_eq!(records[0].coverage, 1.0);
    assert_abs_diff_eq!(records[0].weighted, 2.0);
    assert_abs_diff_eq!(records[1].value, 4.0);
    assert_abs_diff_eq!(records[1].coverage, 0.5);
    assert_abs_diff_eq!(records[1].weighted, 2.0);
}
