//! Python bindings

use crate::core::period::{enumerate_periods as periods_between, PeriodUnit};
use crate::core::qa_mask::{build_validity_mask, classify, QaCodeTable};
use crate::core::qa_tables::code_table_preset;
use crate::types::{MosaicError, MosaicResult};
use crate::viz;
use chrono::{DateTime, NaiveDate, Utc};
use numpy::{IntoPyArray, PyReadonlyArray2};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

impl From<MosaicError> for PyErr {
    fn from(err: MosaicError) -> PyErr {
        match err {
            MosaicError::Io(_) | MosaicError::Csv(_) => PyRuntimeError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

/// Preset name, or a JSON code table when the string starts with `{`
fn resolve_table(table: &str) -> MosaicResult<QaCodeTable> {
    if table.trim_start().starts_with('{') {
        QaCodeTable::from_json(table)
    } else {
        code_table_preset(table)
    }
}

fn parse_time(value: &str) -> MosaicResult<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .ok_or_else(|| MosaicError::InvalidParameter(format!("Invalid timestamp: {}", value)))
}

/// Decode a QA array into a dict of boolean masks, one per condition
#[pyfunction]
fn classify_qa<'py>(
    py: Python<'py>,
    qa: PyReadonlyArray2<'py, i64>,
    table: &str,
) -> PyResult<&'py PyDict> {
    let table = resolve_table(table)?;
    let classes = classify(&qa.as_array().to_owned(), &table);

    let dict = PyDict::new(py);
    for (name, mask) in classes {
        dict.set_item(name, mask.into_pyarray(py))?;
    }
    Ok(dict)
}

/// Boolean array that is true where none of `excluded` matches
#[pyfunction]
fn validity_mask<'py>(
    py: Python<'py>,
    qa: PyReadonlyArray2<'py, i64>,
    table: &str,
    excluded: Vec<String>,
) -> PyResult<&'py numpy::PyArray2<bool>> {
    let table = resolve_table(table)?;
    let excluded: Vec<&str> = excluded.iter().map(String::as_str).collect();
    let mask = build_validity_mask(&qa.as_array().to_owned(), &table, &excluded)?;
    Ok(mask.into_pyarray(py))
}

/// List of `(label, start_millis)` for each period in `[start, end)`
#[pyfunction]
#[pyo3(signature = (start, end, unit = "month"))]
fn enumerate_periods(start: &str, end: &str, unit: &str) -> PyResult<Vec<(String, i64)>> {
    let unit: PeriodUnit = unit.parse()?;
    let periods = periods_between(parse_time(start)?, parse_time(end)?, unit)?;
    Ok(periods
        .iter()
        .map(|p| (p.label(), p.start_millis()))
        .collect())
}

/// Visualization preset as a JSON string
#[pyfunction]
fn vis_preset(name: &str) -> PyResult<String> {
    Ok(viz::vis_preset(name)?.to_json()?)
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(classify_qa, m)?)?;
    m.add_function(wrap_pyfunction!(validity_mask, m)?)?;
    m.add_function(wrap_pyfunction!(enumerate_periods, m)?)?;
    m.add_function(wrap_pyfunction!(vis_preset, m)?)?;
    Ok(())
}
