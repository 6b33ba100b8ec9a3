//! Unit tests for the record normalizer

use crate::support::as_raw;
use devops_etl::normalize::{normalize, normalize_batch, normalize_strict, NormalizeError};
use devops_etl::{FetcherError, FieldValue, ResourceType};
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;

#[test]
fn test_commit_flattens_stats_and_defaults_counts() {
    let with_stats = as_raw(json!({
        "id": "a1b2c3",
        "project_id": 42,
        "author_name": "Ada",
        "created_at": "2024-02-01T08:30:00.000Z",
        "stats": { "additions": 12, "deletions": 3, "total": 15 },
    }));
    let record = normalize(ResourceType::Commits, &with_stats).unwrap();
    assert_eq!(record.int("additions"), Some(12));
    assert_eq!(record.int("deletions"), Some(3));
    assert_eq!(record.get("project_id"), &FieldValue::Int(42));
    assert_eq!(
        record.timestamp("created_at"),
        Some(Utc.with_ymd_and_hms(2024, 2, 1, 8, 30, 0).unwrap())
    );

    let without_stats = as_raw(json!({ "id": "d4e5f6" }));
    let record = normalize(ResourceType::Commits, &without_stats).unwrap();
    assert_eq!(record.int("additions"), Some(0));
    assert!(record.get("created_at").is_null());
}

#[test]
fn test_unparseable_optional_date_becomes_null() {
    let raw = as_raw(json!({
        "id": 1,
        "created_at": "not a date",
        "last_activity_on": "2024-05-06",
    }));
    let record = normalize(ResourceType::Users, &raw).unwrap();
    assert!(record.get("created_at").is_null());
    assert_eq!(
        record.get("last_activity_on"),
        &FieldValue::Date(NaiveDate::from_ymd_opt(2024, 5, 6).unwrap())
    );
}

#[test]
fn test_issue_nested_people_and_labels() {
    let raw = as_raw(json!({
        "id": 7,
        "project_id": 3,
        "author": { "username": "reporter" },
        "assignees": [{ "username": "carol" }, { "username": "dan" }],
        "labels": ["bug", "priority::high"],
        "state": "opened",
    }));
    let record = normalize(ResourceType::Issues, &raw).unwrap();
    assert_eq!(record.text("author"), Some("reporter"));
    assert_eq!(
        record.get("assignees").as_list(),
        Some(&["carol".to_string(), "dan".to_string()][..])
    );
    assert_eq!(record.get("labels").as_list().map(<[String]>::len), Some(2));
}

#[test]
fn test_branch_requires_project_and_name() {
    let raw = as_raw(json!({ "name": "main", "commit": { "id": "abc" } }));
    assert!(matches!(
        normalize(ResourceType::Branches, &raw),
        Err(NormalizeError::MissingField { field: "project_id", .. })
    ));
}

#[test]
fn test_batch_keeps_good_records_and_reports_bad_ones() {
    let raws = vec![
        as_raw(json!({ "id": 1 })),
        as_raw(json!({ "username": "no-id" })),
        as_raw(json!({ "id": "not-a-number" })),
        as_raw(json!({ "id": "3" })),
    ];
    let batch = normalize_batch(ResourceType::Users, &raws);
    assert_eq!(batch.records.len(), 2);
    assert_eq!(batch.records[1].int("id"), Some(3));
    let rejected: Vec<usize> = batch.rejected.iter().map(|r| r.index).collect();
    assert_eq!(rejected, vec![1, 2]);
    assert!(matches!(batch.rejected[1].error, NormalizeError::InvalidField { .. }));
}

#[test]
fn test_strict_mode_fails_with_index() {
    let raws = vec![as_raw(json!({ "id": 1 })), as_raw(json!({}))];
    match normalize_strict(ResourceType::Groups, &raws) {
        Err(FetcherError::Validation(message)) => assert!(message.starts_with("record 1")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_non_finite_float_becomes_null() {
    for text in ["NaN", "inf", "-inf", "Infinity"] {
        let raw = as_raw(json!({
            "id": 7,
            "status": "success",
            "duration": text,
        }));
        let record = normalize(ResourceType::Pipelines, &raw).unwrap();
        assert!(record.get("duration").is_null(), "{text} should normalize to null");
    }

    let raw = as_raw(json!({ "id": 8, "duration": "12.5" }));
    let record = normalize(ResourceType::Pipelines, &raw).unwrap();
    assert_eq!(record.get("duration"), &FieldValue::Float(12.5));
}
