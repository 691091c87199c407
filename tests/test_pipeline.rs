use chrono::{DateTime, TimeZone, Utc};
use ndarray::{array, Array2};
use qamosaic::core::composite::{ReductionRule, TemporalCompositor};
use qamosaic::core::period::PeriodUnit;
use qamosaic::core::pipeline::CompositePipeline;
use qamosaic::core::qa_tables::mask_preset;
use qamosaic::io::{load_pipeline_config, CollectingSink, CsvSink};
use qamosaic::types::{GeoTransform, Raster};
use std::io::Write;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn landsat8(id: &str, t: DateTime<Utc>, red: f64, pixel_qa: Array2<f64>) -> Raster {
    Raster::new(id, t, GeoTransform::north_up(500_000.0, 4_200_000.0, 30.0))
        .with_band("B4", Array2::from_elem(pixel_qa.dim(), red))
        .unwrap()
        .with_band("pixel_qa", pixel_qa)
        .unwrap()
}

fn series() -> Vec<Raster> {
    vec![
        landsat8("LC08_0105", ymd(2020, 1, 5), 100.0, array![[322.0, 322.0]]),
        // cloudy on the right
        landsat8("LC08_0121", ymd(2020, 1, 21), 200.0, array![[322.0, 480.0]]),
        landsat8("LC08_0206", ymd(2020, 2, 6), 300.0, array![[328.0, 386.0]]),
    ]
}

#[test]
fn test_pipeline_masks_before_compositing() {
    init_logging();

    let pipeline = CompositePipeline::new(
        mask_preset("landsat8_cloud").unwrap(),
        TemporalCompositor::with_unit(PeriodUnit::Month),
    );

    let mut sink = CollectingSink::default();
    let written = pipeline
        .run(&series(), ymd(2020, 1, 1), ymd(2020, 3, 1), &ReductionRule::LatestMosaic, &mut sink)
        .unwrap();
    assert_eq!(written, 2);
    assert_eq!(sink.composites.len(), 2);

    let january = sink.composites[0].raster().unwrap();
    // the cloudy pixel of Jan 21 falls back to Jan 5
    assert_eq!(january.band("B4").unwrap(), &array![[200.0, 100.0]]);

    let february = sink.composites[1].raster().unwrap();
    // shadow pixel has no valid observation
    assert!(february.band("B4").unwrap()[[0, 0]].is_nan());
    assert_eq!(february.mask().unwrap(), &array![[false, true]]);
}

#[test]
fn test_pipeline_from_config_file_to_csv() {
    init_logging();

    let mut config_file = tempfile::NamedTempFile::new().unwrap();
    write!(
        config_file,
        r#"{{
            "period_unit": "month",
            "series_start": "2020-01-01T00:00:00Z",
            "series_end": "2020-03-01T00:00:00Z",
            "method": "median",
            "mask_rules": [{{"preset": "landsat8_cloud"}}]
        }}"#
    )
    .unwrap();
    let config = load_pipeline_config(config_file.path()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("composites.csv");
    let mut sink = CsvSink::create(&path).unwrap();
    let written = CompositePipeline::run_config(&config, &series(), &mut sink).unwrap();
    assert_eq!(written, 2);
    drop(sink);

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[0], "date");
    assert_eq!(&headers[1], "time_start");

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "2020-01-01");
    assert_eq!(&rows[0][1], ymd(2020, 1, 1).timestamp_millis().to_string());
    // source_count, band_count, valid_pixels
    assert_eq!(&rows[0][2], "2");
    assert_eq!(&rows[0][3], "2");
    assert_eq!(&rows[0][4], "2");
    assert_eq!(&rows[1][0], "2020-02-01");
    assert_eq!(&rows[1][4], "1");
}

#[test]
fn test_unknown_preset_in_config() {
    let json = r#"{
        "period_unit": "day",
        "series_start": "2020-01-01T00:00:00Z",
        "series_end": "2020-01-05T00:00:00Z",
        "method": "latest_mosaic",
        "mask_rules": [{"preset": "modis_cloud"}]
    }"#;
    let config = serde_json::from_str(json).unwrap();
    assert!(CompositePipeline::from_config(&config).is_err());
}
