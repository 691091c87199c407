use crate::core::composite::CompositeResult;
use crate::core::coverage::RegionTable;
use crate::types::{MosaicError, MosaicResult};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Destination for composites and region tables
pub trait ResultSink {
    fn write_composites(&mut self, results: &[CompositeResult]) -> MosaicResult<()>;

    fn write_table(&mut self, table: &RegionTable) -> MosaicResult<()>;
}

/// Column layout of a CSV sink
#[derive(Debug, Clone, PartialEq)]
enum Layout {
    Composites,
    Table(Vec<String>),
}

/// CSV writer: one row per composite, or one row per image for region tables.
///
/// A sink holds one kind of output. The header is written by the first call;
/// later calls append rows and must use the same layout (composites, or a
/// region table with the same columns), otherwise they fail with
/// `InvalidParameter`.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    layout: Option<Layout>,
}

impl CsvSink<File> {
    /// Create (or truncate) a CSV file at `path`
    pub fn create<P: AsRef<Path>>(path: P) -> MosaicResult<Self> {
        log::info!("Writing CSV results to {}", path.as_ref().display());
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
            layout: None,
        })
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
            layout: None,
        }
    }

    /// Write `header` unless this sink already started with `layout`
    fn begin(&mut self, layout: Layout, header: &[String]) -> MosaicResult<()> {
        match &self.layout {
            None => {
                self.writer.write_record(header)?;
                self.layout = Some(layout);
                Ok(())
            }
            Some(current) if *current == layout => Ok(()),
            Some(current) => Err(MosaicError::InvalidParameter(format!(
                "CSV sink already holds {:?} rows, cannot append {:?} rows",
                current, layout
            ))),
        }
    }

    /// Flush and return the underlying writer
    pub fn into_inner(self) -> MosaicResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| io::Error::new(e.error().kind(), e.to_string()).into())
    }
}

impl<W: Write> ResultSink for CsvSink<W> {
    fn write_composites(&mut self, results: &[CompositeResult]) -> MosaicResult<()> {
        let header: Vec<String> = [
            "date",
            "time_start",
            "source_count",
            "band_count",
            "valid_pixels",
            "record_count",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect();
        self.begin(Layout::Composites, &header)?;

        for result in results {
            let valid = result.raster().map_or(0, |r| r.valid_pixel_count());
            let records = result.records().map_or(0, |r| r.len());
            self.writer.write_record([
                result.date.clone(),
                result.time_start_millis.to_string(),
                result.source_count.to_string(),
                result.band_count().to_string(),
                valid.to_string(),
                records.to_string(),
            ])?;
        }

        self.writer.flush()?;
        log::debug!("Wrote {} composite rows", results.len());
        Ok(())
    }

    fn write_table(&mut self, table: &RegionTable) -> MosaicResult<()> {
        let mut header = vec!["imageId".to_string(), "imageDate".to_string()];
        header.extend(table.columns.iter().cloned());
        self.begin(Layout::Table(table.columns.clone()), &header)?;

        for row in &table.rows {
            let mut record = vec![row.image_id.clone(), row.image_date.clone()];
            // regions without a value for this image stay empty
            record.extend(
                table
                    .columns
                    .iter()
                    .map(|c| row.values.get(c).map(|v| v.to_string()).unwrap_or_default()),
            );
            self.writer.write_record(&record)?;
        }

        self.writer.flush()?;
        log::debug!("Wrote region table with {} rows", table.rows.len());
        Ok(())
    }
}

/// In-memory sink
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub composites: Vec<CompositeResult>,
    pub tables: Vec<RegionTable>,
}

impl ResultSink for CollectingSink {
    fn write_composites(&mut self, results: &[CompositeResult]) -> MosaicResult<()> {
        self.composites.extend_from_slice(results);
        Ok(())
    }

    fn write_table(&mut self, table: &RegionTable) -> MosaicResult<()> {
        self.tables.push(table.clone());
        Ok(())
    }
}
