//! Record export writers
//!
//! Records are flattened into [`Row`]s (ordered column/value pairs) before
//! being handed to a [`RecordWriter`]. Normalized records keep their schema
//! column order; historized records gain `valid_from`, `valid_to` and
//! `is_current` columns.

use crate::history::HistorizedRecord;
use crate::normalize::schema;
use crate::{NormalizedRecord, RawRecord};
use serde_json::Value;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

pub mod csv;
pub mod json;

pub use self::csv::CsvRecordWriter;
pub use self::json::JsonRecordWriter;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    Csv(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// One exported row: column names with their values, in column order
pub type Row = Vec<(String, Value)>;

/// Export file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Comma-separated values with a header row
    #[default]
    Csv,
    /// Pretty-printed JSON array
    Json,
}

impl OutputFormat {
    /// Guess the format from a file extension, defaulting to CSV
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => OutputFormat::Json,
            _ => OutputFormat::Csv,
        }
    }
}

/// Sink for exported rows
pub trait RecordWriter {
    /// Write one row
    fn write_row(&mut self, row: &Row) -> OutputResult<()>;

    /// Write several rows
    fn write_rows(&mut self, rows: &[Row]) -> OutputResult<()> {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    /// Rows accepted so far
    fn rows_written(&self) -> u64;

    /// Finalize the output and sync it to disk
    fn close(self) -> OutputResult<()>
    where
        Self: Sized;
}

/// Write `rows` to `path` in `format`, returning the number of rows written
pub fn write_rows(path: &Path, format: OutputFormat, rows: &[Row]) -> OutputResult<u64> {
    fn drain<W: RecordWriter>(mut writer: W, rows: &[Row]) -> OutputResult<u64> {
        writer.write_rows(rows)?;
        let written = writer.rows_written();
        writer.close()?;
        Ok(written)
    }

    let written = match format {
        OutputFormat::Csv => drain(CsvRecordWriter::new(path)?, rows)?,
        OutputFormat::Json => drain(JsonRecordWriter::new(path)?, rows)?,
    };
    info!("Wrote {} rows to {}", written, path.display());
    Ok(written)
}

/// Create `path` (and its parent directories) for buffered writing
pub(crate) fn create_file(path: &Path) -> OutputResult<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| OutputError::Io(format!("Failed to create directory: {}", e)))?;
    }
    let file = File::create(path).map_err(|e| OutputError::Io(format!("Failed to create file: {}", e)))?;
    Ok(BufWriter::new(file))
}

/// Row for a normalized record: schema fields first, then any extras
pub fn record_row(record: &NormalizedRecord) -> Row {
    let mut row: Row = Vec::with_capacity(record.fields.len());
    for name in schema::field_names(record.resource) {
        if let Some(value) = record.fields.get(name) {
            row.push((name.to_string(), value.to_json()));
        }
    }
    for (name, value) in &record.fields {
        if !row.iter().any(|(existing, _)| existing == name) {
            row.push((name.clone(), value.to_json()));
        }
    }
    row
}

/// Row for a historized record with validity columns appended
pub fn history_row(record: &HistorizedRecord) -> Row {
    let mut row = record_row(&record.record);
    row.push(("valid_from".into(), Value::String(record.valid_from.to_rfc3339())));
    row.push((
        "valid_to".into(),
        record
            .valid_to
            .map(|ts| Value::String(ts.to_rfc3339()))
            .unwrap_or(Value::Null),
    ));
    row.push(("is_current".into(), Value::Bool(record.is_current)));
    row
}

/// Row for an unnormalized record, keys in map order
pub fn raw_row(raw: &RawRecord) -> Row {
    raw.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}
