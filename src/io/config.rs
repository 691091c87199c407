use crate::core::pipeline::PipelineConfig;
use crate::core::qa_mask::QaCodeTable;
use crate::types::MosaicResult;
use std::fs;
use std::path::Path;

/// Read a QA code table from a JSON file
pub fn load_code_table<P: AsRef<Path>>(path: P) -> MosaicResult<QaCodeTable> {
    log::info!("Loading QA code table: {}", path.as_ref().display());
    let text = fs::read_to_string(path)?;
    let table = QaCodeTable::from_json(&text)?;
    log::debug!(
        "Loaded table '{}' for band '{}' with {} conditions",
        table.product,
        table.band,
        table.conditions.len()
    );
    Ok(table)
}

/// Read a pipeline configuration from a JSON file
pub fn load_pipeline_config<P: AsRef<Path>>(path: P) -> MosaicResult<PipelineConfig> {
    log::info!("Loading pipeline configuration: {}", path.as_ref().display());
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
