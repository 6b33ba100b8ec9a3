//! Record normalization
//!
//! Pure conversion of raw payloads into [`NormalizedRecord`]s using the
//! per-resource tables in [`schema`]. No I/O happens here.

use crate::fetcher::{FetcherError, FetcherResult};
use crate::metrics;
use crate::{FieldValue, NormalizedRecord, RawRecord, ResourceType};
use serde_json::Value;
use tracing::warn;

pub mod dates;
pub mod schema;

use schema::{schema_for, FieldKind, FieldSpec};

/// Per-record validation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// Required field absent or null
    #[error("{resource} record is missing required field '{field}'")]
    MissingField {
        /// Resource type
        resource: ResourceType,
        /// Field name
        field: &'static str,
    },

    /// Required field present but not convertible
    #[error("{resource} field '{field}' has invalid value {value}")]
    InvalidField {
        /// Resource type
        resource: ResourceType,
        /// Field name
        field: &'static str,
        /// Offending raw value
        value: String,
    },
}

/// A raw record that failed normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    /// Position in the input batch
    pub index: usize,
    /// Why it was rejected
    pub error: NormalizeError,
}

/// Result of normalizing a batch: the good records plus the rejections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    /// Successfully normalized records, in input order
    pub records: Vec<NormalizedRecord>,
    /// Rejected inputs
    pub rejected: Vec<RejectedRecord>,
}

/// Normalize one raw record
pub fn normalize(resource: ResourceType, raw: &RawRecord) -> Result<NormalizedRecord, NormalizeError> {
    let mut record = NormalizedRecord::new(resource);
    for spec in schema_for(resource) {
        let raw_value = schema::lookup_path(raw, spec.path);
        let value = convert(spec.kind, raw_value);
        if spec.required && value.is_null() {
            return Err(match raw_value {
                None => NormalizeError::MissingField {
                    resource,
                    field: spec.name,
                },
                Some(v) => NormalizeError::InvalidField {
                    resource,
                    field: spec.name,
                    value: v.to_string(),
                },
            });
        }
        record.insert(spec.name, value);
    }
    Ok(record)
}

/// Normalize a batch, collecting rejections instead of aborting
pub fn normalize_batch(resource: ResourceType, raws: &[RawRecord]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for (index, raw) in raws.iter().enumerate() {
        match normalize(resource, raw) {
            Ok(record) => batch.records.push(record),
            Err(error) => {
                warn!(resource = %resource, index, error = %error, "Rejected record");
                batch.rejected.push(RejectedRecord { index, error });
            }
        }
    }
    metrics::record_rejected(resource.as_str(), batch.rejected.len() as u64);
    batch
}

/// Normalize a batch, failing on the first rejected record
pub fn normalize_strict(resource: ResourceType, raws: &[RawRecord]) -> FetcherResult<Vec<NormalizedRecord>> {
    raws.iter()
        .enumerate()
        .map(|(index, raw)| {
            normalize(resource, raw)
                .map_err(|e| FetcherError::Validation(format!("record {index}: {e}")))
        })
        .collect()
}

/// Convert one raw value according to its kind
pub fn convert(kind: FieldKind, value: Option<&Value>) -> FieldValue {
    match kind {
        FieldKind::Int => value.and_then(to_i64).map_or(FieldValue::Null, FieldValue::Int),
        FieldKind::Count => FieldValue::Int(value.and_then(to_count).unwrap_or(0)),
        FieldKind::Ident => match value {
            Some(v) => match to_i64(v) {
                Some(id) => FieldValue::Int(id),
                None => to_text(v).map_or(FieldValue::Null, FieldValue::Text),
            },
            None => FieldValue::Null,
        },
        FieldKind::Float => value.and_then(to_f64).map_or(FieldValue::Null, FieldValue::Float),
        FieldKind::Text => value.and_then(to_text).map_or(FieldValue::Null, FieldValue::Text),
        FieldKind::Bool => FieldValue::Bool(value.and_then(to_bool).unwrap_or(false)),
        FieldKind::Timestamp => value
            .and_then(dates::parse_timestamp)
            .map_or(FieldValue::Null, FieldValue::Timestamp),
        FieldKind::Date => value
            .and_then(dates::parse_date)
            .map_or(FieldValue::Null, FieldValue::Date),
        FieldKind::TextList => FieldValue::List(
            value
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(to_text).collect())
                .unwrap_or_default(),
        ),
        FieldKind::PluckList(sub_field) => FieldValue::List(
            value
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item.get(sub_field))
                        .filter_map(to_text)
                        .collect()
                })
                .unwrap_or_default(),
        ),
    }
}

fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Counts sometimes arrive as `"1000+"`
fn to_count(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => {
            let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        other => to_i64(other),
    }
}

/// Finite floats only; `"NaN"` and `"inf"` parse but cannot be stored or compared
fn to_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

/// Schema entry for a field, if the resource has one
pub fn field_spec(resource: ResourceType, name: &str) -> Option<&'static FieldSpec> {
    schema_for(resource).iter().find(|spec| spec.name == name)
}
