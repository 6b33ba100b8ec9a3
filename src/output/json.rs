//! JSON output writer

use super::{create_file, OutputError, OutputResult, RecordWriter, Row};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Serializes a row as an object, preserving column order
struct OrderedRow<'a>(&'a Row);

impl Serialize for OrderedRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, value) in self.0 {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Writes a pretty-printed JSON array of objects on close
pub struct JsonRecordWriter {
    file: BufWriter<File>,
    rows: Vec<Row>,
}

impl JsonRecordWriter {
    /// Create a writer at `path`, creating parent directories
    pub fn new<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        let path = path.as_ref();
        info!("Creating JSON writer: path={}", path.display());
        Ok(Self {
            file: create_file(path)?,
            rows: Vec::new(),
        })
    }
}

impl RecordWriter for JsonRecordWriter {
    fn write_row(&mut self, row: &Row) -> OutputResult<()> {
        self.rows.push(row.clone());
        Ok(())
    }

    fn rows_written(&self) -> u64 {
        self.rows.len() as u64
    }

    fn close(mut self) -> OutputResult<()> {
        let ordered: Vec<OrderedRow<'_>> = self.rows.iter().map(OrderedRow).collect();
        serde_json::to_writer_pretty(&mut self.file, &ordered)
            .map_err(|e| OutputError::Serialization(e.to_string()))?;
        self.file
            .write_all(b"\n")
            .map_err(|e| OutputError::Io(format!("Failed to write: {}", e)))?;

        let file = self
            .file
            .into_inner()
            .map_err(|e| OutputError::Io(format!("Failed to get file handle: {}", e)))?;
        file.sync_all()
            .map_err(|e| OutputError::Io(format!("Failed to sync file: {}", e)))?;

        debug!("JSON writer closed: {} rows written", self.rows.len());
        Ok(())
    }
}
