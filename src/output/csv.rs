//! CSV output writer

use super::{create_file, OutputError, OutputResult, RecordWriter, Row};
use ::csv::Writer;
use serde_json::Value;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info};

/// Header written when an export has no rows
pub const NO_DATA_HEADER: &str = "no_data";

/// CSV writer whose header comes from the first row's columns
pub struct CsvRecordWriter {
    writer: Writer<BufWriter<File>>,
    header: Option<Vec<String>>,
    rows_written: u64,
}

impl CsvRecordWriter {
    /// Create a writer at `path`, creating parent directories
    pub fn new<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        let path = path.as_ref();
        info!("Creating CSV writer: path={}", path.display());
        Ok(Self {
            writer: Writer::from_writer(create_file(path)?),
            header: None,
            rows_written: 0,
        })
    }

    fn write_header(&mut self, columns: Vec<String>) -> OutputResult<()> {
        self.writer
            .write_record(&columns)
            .map_err(|e| OutputError::Csv(format!("Failed to write header: {}", e)))?;
        debug!("CSV header: {} columns", columns.len());
        self.header = Some(columns);
        Ok(())
    }
}

/// Render a value as a CSV cell
pub fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

impl RecordWriter for CsvRecordWriter {
    fn write_row(&mut self, row: &Row) -> OutputResult<()> {
        if self.header.is_none() {
            self.write_header(row.iter().map(|(c, _)| c.clone()).collect())?;
        }
        let header = self.header.as_deref().unwrap_or_default();
        let cells: Vec<String> = header
            .iter()
            .map(|column| {
                row.iter()
                    .find(|(name, _)| name == column)
                    .map(|(_, value)| cell(value))
                    .unwrap_or_default()
            })
            .collect();

        self.writer
            .write_record(&cells)
            .map_err(|e| OutputError::Csv(format!("Failed to write row: {}", e)))?;
        self.rows_written += 1;

        if self.rows_written % 1000 == 0 {
            self.writer
                .flush()
                .map_err(|e| OutputError::Io(format!("Failed to flush: {}", e)))?;
            debug!("Progress: {} rows written", self.rows_written);
        }
        Ok(())
    }

    fn rows_written(&self) -> u64 {
        self.rows_written
    }

    fn close(mut self) -> OutputResult<()> {
        if self.header.is_none() {
            self.write_header(vec![NO_DATA_HEADER.to_string()])?;
        }
        self.writer
            .flush()
            .map_err(|e| OutputError::Io(format!("Failed to flush: {}", e)))?;

        let buf_writer = self
            .writer
            .into_inner()
            .map_err(|e| OutputError::Io(format!("Failed to get inner writer: {}", e)))?;
        let file = buf_writer
            .into_inner()
            .map_err(|e| OutputError::Io(format!("Failed to get file handle: {}", e)))?;
        file.sync_all()
            .map_err(|e| OutputError::Io(format!("Failed to sync file: {}", e)))?;

        debug!("CSV writer closed: {} rows written", self.rows_written);
        Ok(())
    }
}
