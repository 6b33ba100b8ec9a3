//! Historization across runs with the on-disk store and exports

use crate::support::as_raw;
use devops_etl::history::{apply, HistoryError, HistoryStore, ScdOptions};
use devops_etl::normalize::normalize_batch;
use devops_etl::output::{history_row, write_rows, OutputFormat, Row};
use devops_etl::ResourceType;
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

fn snapshot(stars: i64) -> Vec<devops_etl::NormalizedRecord> {
    let raws = vec![
        as_raw(json!({ "id": 1, "name": "api", "star_count": stars, "topics": ["rust"],
                       "created_at": "2023-06-01T12:00:00Z" })),
        as_raw(json!({ "id": 2, "name": "web", "star_count": 3 })),
    ];
    normalize_batch(ResourceType::Projects, &raws).records
}

#[test]
fn test_runs_persist_and_reload_without_spurious_versions() {
    let dir = TempDir::new().unwrap();
    let store = HistoryStore::new(dir.path().join("state/projects.json"));
    let options = ScdOptions::for_resource(ResourceType::Projects);
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let first = store.load(ResourceType::Projects, &options.key_fields).unwrap();
    assert!(first.records.is_empty());
    let outcome = apply(first.records, &snapshot(1), &options, t0).unwrap();
    assert_eq!(outcome.summary.inserted, 2);
    store.save(ResourceType::Projects, &options.key_fields, &outcome.records).unwrap();

    // Same data after a reload must compare equal
    let second = store.load(ResourceType::Projects, &options.key_fields).unwrap();
    let outcome = apply(second.records, &snapshot(1), &options, t0 + Duration::days(1)).unwrap();
    assert_eq!(outcome.summary.unchanged, 2);
    assert_eq!(outcome.records.len(), 2);

    let outcome = apply(outcome.records, &snapshot(9), &options, t0 + Duration::days(2)).unwrap();
    assert_eq!(outcome.summary.changed, 1);
    store.save(ResourceType::Projects, &options.key_fields, &outcome.records).unwrap();
    assert_eq!(
        store.load(ResourceType::Projects, &options.key_fields).unwrap().records.len(),
        3
    );

    let export = dir.path().join("projects_history.csv");
    let rows: Vec<Row> = outcome.records.iter().map(history_row).collect();
    assert_eq!(write_rows(&export, OutputFormat::Csv, &rows).unwrap(), 3);
    let content = std::fs::read_to_string(&export).unwrap();
    let header = content.lines().next().unwrap();
    assert!(header.starts_with("id,name,"));
    assert!(header.ends_with("valid_from,valid_to,is_current"));
    assert_eq!(content.lines().filter(|l| l.ends_with(",true")).count(), 2);
}

#[test]
fn test_store_rejects_other_resource_or_keys() {
    let dir = TempDir::new().unwrap();
    let store = HistoryStore::new(dir.path().join("projects.json"));
    let options = ScdOptions::for_resource(ResourceType::Projects);
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let outcome = apply(vec![], &snapshot(1), &options, t0).unwrap();
    store.save(ResourceType::Projects, &options.key_fields, &outcome.records).unwrap();

    assert!(matches!(
        store.load(ResourceType::Users, &options.key_fields),
        Err(HistoryError::ResourceMismatch { .. })
    ));
    assert!(matches!(
        store.load(ResourceType::Projects, &["name".to_string()]),
        Err(HistoryError::KeyFieldsMismatch { .. })
    ));
}

#[test]
fn test_float_fields_survive_save_and_load() {
    let dir = TempDir::new().unwrap();
    let store = HistoryStore::new(dir.path().join("pipelines.json"));
    let options = ScdOptions::for_resource(ResourceType::Pipelines);
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let raws = vec![
        as_raw(json!({ "id": 1, "status": "success", "duration": 12.5 })),
        as_raw(json!({ "id": 2, "status": "failed", "duration": "NaN" })),
        as_raw(json!({ "id": 3, "status": "running", "duration": "inf" })),
    ];
    let pipelines = normalize_batch(ResourceType::Pipelines, &raws).records;
    assert_eq!(pipelines.len(), 3);

    let outcome = apply(vec![], &pipelines, &options, t0).unwrap();
    store.save(ResourceType::Pipelines, &options.key_fields, &outcome.records).unwrap();

    let reloaded = store.load(ResourceType::Pipelines, &options.key_fields).unwrap();
    assert_eq!(reloaded.records, outcome.records);

    let rerun = apply(reloaded.records, &pipelines, &options, t0 + Duration::days(1)).unwrap();
    assert_eq!(rerun.summary.unchanged, 3);
    assert_eq!(rerun.summary.changed, 0);
    assert_eq!(rerun.records.len(), 3);
}
