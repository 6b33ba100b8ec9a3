//! SCD Type 2 historization
//!
//! [`apply`] merges a fresh snapshot of normalized records into the existing
//! version set. For every entity key:
//! - at most one version is open (`valid_to == None`)
//! - versions ordered by `valid_from` tile time without gaps or overlaps
//! - a version is closed once and never touched again
//! - adjacent versions differ in at least one tracked field
//!
//! Deletion is never inferred from absence unless `close_missing` is set.

use crate::{NormalizedRecord, ResourceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

pub mod store;

pub use store::HistoryStore;

/// One key field of an entity: the value's type plus its canonical text
///
/// `Int(5)` and `Text("5")` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPart {
    /// [`FieldValue::type_name`](crate::FieldValue::type_name) of the value
    pub kind: &'static str,
    /// Canonical text of the value
    pub value: String,
}

impl KeyPart {
    fn render(&self) -> String {
        // Quote numeric-looking text so it cannot pass for an integer key
        if self.kind == "text" && self.value.parse::<i64>().is_ok() {
            format!("\"{}\"", self.value)
        } else {
            self.value.clone()
        }
    }
}

/// Entity identity: one part per key field
pub type EntityKey = Vec<KeyPart>;

/// A normalized record with its validity interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorizedRecord {
    /// Field values of this version
    pub record: NormalizedRecord,
    /// When this version became the truth
    pub valid_from: DateTime<Utc>,
    /// When it was superseded; `None` while current
    pub valid_to: Option<DateTime<Utc>>,
    /// Mirrors `valid_to.is_none()`
    pub is_current: bool,
}

impl HistorizedRecord {
    /// Open a new current version
    pub fn open(record: NormalizedRecord, valid_from: DateTime<Utc>) -> Self {
        Self {
            record,
            valid_from,
            valid_to: None,
            is_current: true,
        }
    }

    /// Whether this is the current version
    pub fn is_open(&self) -> bool {
        self.valid_to.is_none()
    }

    fn close(&mut self, at: DateTime<Utc>) {
        self.valid_to = Some(at);
        self.is_current = false;
    }
}

/// Which fields trigger a new version when they change
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrackedFields {
    /// Every non-key field
    #[default]
    All,
    /// Only the listed fields
    Only(Vec<String>),
}

/// Historization settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScdOptions {
    /// Fields forming the entity key
    pub key_fields: Vec<String>,
    /// Fields compared between snapshot and current version
    pub tracked_fields: TrackedFields,
    /// Close current versions whose key is absent from the snapshot
    pub close_missing: bool,
}

impl ScdOptions {
    /// Options with explicit key fields, tracking everything
    pub fn new<I, S>(key_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key_fields: key_fields.into_iter().map(Into::into).collect(),
            tracked_fields: TrackedFields::All,
            close_missing: false,
        }
    }

    /// Default options for a resource type
    pub fn for_resource(resource: ResourceType) -> Self {
        Self::new(resource.default_key_fields().iter().copied())
    }

    /// Track only the given fields
    pub fn tracking<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tracked_fields = TrackedFields::Only(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Opt into closing versions missing from a complete snapshot
    pub fn close_missing(mut self, close_missing: bool) -> Self {
        self.close_missing = close_missing;
        self
    }
}

/// Historization errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// Snapshot record lacks a key field value
    #[error("record {index} is missing key field '{field}'")]
    MissingKey {
        /// Snapshot position
        index: usize,
        /// Missing field
        field: String,
    },

    /// Key already seen earlier in the same snapshot
    #[error("record {index} repeats key {key} already present in this snapshot")]
    DuplicateKey {
        /// Snapshot position
        index: usize,
        /// Rendered key
        key: String,
    },

    /// Run timestamp not after the current version's start
    #[error("cannot close version of {key}: run time {now} is not after valid_from {valid_from}")]
    ClockSkew {
        /// Rendered key
        key: String,
        /// Start of the open version
        valid_from: DateTime<Utc>,
        /// Run timestamp
        now: DateTime<Utc>,
    },

    /// Records of different resource types mixed in one history
    #[error("resource mismatch: expected {expected}, found {found}")]
    ResourceMismatch {
        /// Resource of the history
        expected: ResourceType,
        /// Resource encountered
        found: ResourceType,
    },

    /// Stored history was built with other key fields
    #[error("key fields mismatch: stored {stored:?}, requested {requested:?}")]
    KeyFieldsMismatch {
        /// Key fields in the store
        stored: Vec<String>,
        /// Key fields requested now
        requested: Vec<String>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Schema version mismatch
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version
        expected: String,
        /// Found schema version
        found: String,
    },

    /// Lock error
    #[error("lock error: {0}")]
    Lock(String),
}

/// Counts of what one application did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySummary {
    /// New keys opened
    pub inserted: usize,
    /// Versions closed and reopened with new values
    pub changed: usize,
    /// Keys whose tracked fields were identical
    pub unchanged: usize,
    /// Versions closed because their key was absent
    pub closed_missing: usize,
}

/// A snapshot record excluded from the update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRejection {
    /// Snapshot position
    pub index: usize,
    /// Why it was excluded
    pub error: HistoryError,
}

/// Result of [`apply`]
#[derive(Debug, Clone, PartialEq)]
pub struct HistorizeOutcome {
    /// Full updated version set (prior versions first, new ones appended)
    pub records: Vec<HistorizedRecord>,
    /// What changed
    pub summary: HistorySummary,
    /// Snapshot records left out
    pub rejected: Vec<SnapshotRejection>,
}

/// Compute the entity key; `Err` carries the first missing field name
pub fn entity_key(record: &NormalizedRecord, key_fields: &[String]) -> Result<EntityKey, String> {
    key_fields
        .iter()
        .map(|field| {
            let value = record.get(field);
            value
                .key_fragment()
                .map(|text| KeyPart {
                    kind: value.type_name(),
                    value: text,
                })
                .ok_or_else(|| field.clone())
        })
        .collect()
}

/// Render a key for messages and exports
pub fn display_key(key: &[KeyPart]) -> String {
    key.iter().map(KeyPart::render).collect::<Vec<_>>().join("/")
}

fn tracked_equal(current: &NormalizedRecord, incoming: &NormalizedRecord, options: &ScdOptions) -> bool {
    match &options.tracked_fields {
        TrackedFields::Only(fields) => fields
            .iter()
            .all(|field| current.get(field) == incoming.get(field)),
        TrackedFields::All => {
            let names: BTreeSet<&String> = current.fields.keys().chain(incoming.fields.keys()).collect();
            names
                .into_iter()
                .filter(|name| !options.key_fields.contains(name))
                .all(|name| current.get(name) == incoming.get(name))
        }
    }
}

fn check_resources(current: &[HistorizedRecord], snapshot: &[NormalizedRecord]) -> Result<(), HistoryError> {
    let mut resources = current
        .iter()
        .map(|v| v.record.resource)
        .chain(snapshot.iter().map(|r| r.resource));
    if let Some(expected) = resources.next() {
        if let Some(found) = resources.find(|r| *r != expected) {
            return Err(HistoryError::ResourceMismatch { expected, found });
        }
    }
    Ok(())
}

/// Index the open version of each key by position
///
/// If stored data holds several open versions for one key, the latest
/// `valid_from` wins and the others are reported.
fn index_open_versions(records: &[HistorizedRecord], key_fields: &[String]) -> HashMap<EntityKey, usize> {
    let mut open: HashMap<EntityKey, usize> = HashMap::new();
    for (pos, version) in records.iter().enumerate().filter(|(_, v)| v.is_open()) {
        let key = match entity_key(&version.record, key_fields) {
            Ok(key) => key,
            Err(field) => {
                warn!(position = pos, field = %field, "Stored version lacks key field, ignoring");
                continue;
            }
        };
        match open.get(&key) {
            Some(&existing) => {
                warn!(key = %display_key(&key), "Multiple open versions for key, using the latest");
                if records[existing].valid_from < version.valid_from {
                    open.insert(key, pos);
                }
            }
            None => {
                open.insert(key, pos);
            }
        }
    }
    open
}

/// Merge `snapshot` into `current` at time `now`
///
/// Per-record problems (missing key, duplicate key, clock skew) exclude that
/// record and are reported in [`HistorizeOutcome::rejected`]. Mixing resource
/// types fails the whole call.
pub fn apply(
    current: Vec<HistorizedRecord>,
    snapshot: &[NormalizedRecord],
    options: &ScdOptions,
    now: DateTime<Utc>,
) -> Result<HistorizeOutcome, HistoryError> {
    check_resources(&current, snapshot)?;

    let mut records = current;
    let mut open = index_open_versions(&records, &options.key_fields);
    let mut seen: HashSet<EntityKey> = HashSet::with_capacity(snapshot.len());
    let mut summary = HistorySummary::default();
    let mut rejected = Vec::new();

    for (index, incoming) in snapshot.iter().enumerate() {
        let key = match entity_key(incoming, &options.key_fields) {
            Ok(key) => key,
            Err(field) => {
                rejected.push(SnapshotRejection {
                    index,
                    error: HistoryError::MissingKey { index, field },
                });
                continue;
            }
        };
        if !seen.insert(key.clone()) {
            rejected.push(SnapshotRejection {
                index,
                error: HistoryError::DuplicateKey {
                    index,
                    key: display_key(&key),
                },
            });
            continue;
        }

        match open.get(&key).copied() {
            None => {
                records.push(HistorizedRecord::open(incoming.clone(), now));
                open.insert(key, records.len() - 1);
                summary.inserted += 1;
            }
            Some(pos) if tracked_equal(&records[pos].record, incoming, options) => {
                summary.unchanged += 1;
            }
            Some(pos) if now <= records[pos].valid_from => {
                rejected.push(SnapshotRejection {
                    index,
                    error: HistoryError::ClockSkew {
                        key: display_key(&key),
                        valid_from: records[pos].valid_from,
                        now,
                    },
                });
            }
            Some(pos) => {
                records[pos].close(now);
                records.push(HistorizedRecord::open(incoming.clone(), now));
                open.insert(key, records.len() - 1);
                summary.changed += 1;
            }
        }
    }

    if options.close_missing {
        for (key, &pos) in &open {
            if seen.contains(key) || !records[pos].is_open() {
                continue;
            }
            if now <= records[pos].valid_from {
                warn!(key = %display_key(key), "Not closing missing key: run time is not after valid_from");
                continue;
            }
            records[pos].close(now);
            summary.closed_missing += 1;
        }
    }

    for rejection in &rejected {
        warn!(index = rejection.index, error = %rejection.error, "Snapshot record excluded from history");
    }
    debug!(
        inserted = summary.inserted,
        changed = summary.changed,
        unchanged = summary.unchanged,
        closed_missing = summary.closed_missing,
        rejected = rejected.len(),
        "Applied snapshot"
    );

    Ok(HistorizeOutcome {
        records,
        summary,
        rejected,
    })
}

/// Versions grouped by rendered key, each group sorted by `valid_from`
pub fn versions_by_key<'a>(
    records: &'a [HistorizedRecord],
    key_fields: &[String],
) -> BTreeMap<String, Vec<&'a HistorizedRecord>> {
    let mut groups: BTreeMap<String, Vec<&HistorizedRecord>> = BTreeMap::new();
    for version in records {
        if let Ok(key) = entity_key(&version.record, key_fields) {
            groups.entry(display_key(&key)).or_default().push(version);
        }
    }
    for versions in groups.values_mut() {
        versions.sort_by_key(|v| v.valid_from);
    }
    groups
}

/// Current versions only
pub fn current_records(records: &[HistorizedRecord]) -> impl Iterator<Item = &HistorizedRecord> {
    records.iter().filter(|v| v.is_open())
}
