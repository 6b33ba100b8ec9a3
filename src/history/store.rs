//! On-disk history store
//!
//! One JSON document per resource history. Writes go to a temp file in the
//! same directory and are renamed into place; an advisory `fd-lock` on a
//! sibling `.lock` file keeps two runs from interleaving.

use super::{HistorizedRecord, HistoryError};
use crate::ResourceType;
use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Current history file schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Persisted document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryDocument {
    /// Format version
    pub schema_version: String,
    /// Resource the history belongs to
    pub resource: ResourceType,
    /// Key fields used to build it
    pub key_fields: Vec<String>,
    /// Last write time
    pub updated_at: DateTime<Utc>,
    /// All versions
    pub records: Vec<HistorizedRecord>,
}

/// File-backed history for one resource
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Store at `path`; nothing is touched until load/save
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Document path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_file(&self) -> Result<File, HistoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| HistoryError::Io(e.to_string()))?;
        }
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.path.with_extension("lock"))
            .map_err(|e| HistoryError::Lock(format!("Failed to open lock file: {e}")))
    }

    /// Load the document; a missing file is an empty history
    pub fn load(&self, resource: ResourceType, key_fields: &[String]) -> Result<HistoryDocument, HistoryError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No history file yet, starting empty");
            return Ok(HistoryDocument {
                schema_version: SCHEMA_VERSION.to_string(),
                resource,
                key_fields: key_fields.to_vec(),
                updated_at: Utc::now(),
                records: Vec::new(),
            });
        }

        let lock = RwLock::new(self.lock_file()?);
        let _guard = lock
            .read()
            .map_err(|e| HistoryError::Lock(format!("Failed to acquire read lock: {e}")))?;

        let contents = std::fs::read_to_string(&self.path).map_err(|e| HistoryError::Io(e.to_string()))?;
        let document: HistoryDocument = serde_json::from_str(&contents).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "Failed to deserialize history");
            HistoryError::Serialization(e.to_string())
        })?;

        if document.schema_version != SCHEMA_VERSION {
            return Err(HistoryError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION.to_string(),
                found: document.schema_version,
            });
        }
        if document.resource != resource {
            return Err(HistoryError::ResourceMismatch {
                expected: resource,
                found: document.resource,
            });
        }
        if document.key_fields != key_fields {
            return Err(HistoryError::KeyFieldsMismatch {
                stored: document.key_fields,
                requested: key_fields.to_vec(),
            });
        }

        info!(
            path = %self.path.display(),
            records = document.records.len(),
            "History loaded"
        );
        Ok(document)
    }

    /// Atomically replace the document with `records`
    pub fn save(
        &self,
        resource: ResourceType,
        key_fields: &[String],
        records: &[HistorizedRecord],
    ) -> Result<(), HistoryError> {
        let document = HistoryDocument {
            schema_version: SCHEMA_VERSION.to_string(),
            resource,
            key_fields: key_fields.to_vec(),
            updated_at: Utc::now(),
            records: records.to_vec(),
        };
        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| HistoryError::Serialization(e.to_string()))?;

        let mut lock = RwLock::new(self.lock_file()?);
        let _guard = lock
            .write()
            .map_err(|e| HistoryError::Lock(format!("Failed to acquire write lock: {e}")))?;

        let parent_dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
            .map_err(|e| HistoryError::Io(format!("Failed to create temp file: {e}")))?;
        temp_file
            .write_all(json.as_bytes())
            .map_err(|e| HistoryError::Io(format!("Failed to write temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| HistoryError::Io(format!("Failed to sync temp file: {e}")))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| HistoryError::Io(format!("Failed to persist temp file: {e}")))?;

        info!(
            path = %self.path.display(),
            records = records.len(),
            "History saved"
        );
        Ok(())
    }
}
