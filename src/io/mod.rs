//! Result sinks and configuration loading

pub mod config;
pub mod sink;

pub use config::{load_code_table, load_pipeline_config};
pub use sink::{CollectingSink, CsvSink, ResultSink};
