//! Unit tests for SCD2 historization

use devops_etl::history::{apply, current_records, versions_by_key, HistoryError, ScdOptions};
use devops_etl::{FieldValue, HistorizedRecord, NormalizedRecord, ResourceType};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn project(id: i64, name: &str, stars: i64) -> NormalizedRecord {
    NormalizedRecord::new(ResourceType::Projects)
        .with("id", FieldValue::Int(id))
        .with("name", FieldValue::Text(name.into()))
        .with("star_count", FieldValue::Int(stars))
}

fn run(
    current: Vec<HistorizedRecord>,
    snapshot: &[NormalizedRecord],
    options: &ScdOptions,
    now: DateTime<Utc>,
) -> Vec<HistorizedRecord> {
    apply(current, snapshot, options, now).unwrap().records
}

#[test]
fn test_three_runs_build_a_version_chain() {
    let options = ScdOptions::for_resource(ResourceType::Projects);
    let t1 = t0() + Duration::days(1);
    let t2 = t0() + Duration::days(2);

    let history = run(vec![], &[project(1, "api", 1)], &options, t0());
    let history = run(history, &[project(1, "api", 1)], &options, t1);
    assert_eq!(history.len(), 1, "unchanged snapshot adds nothing");

    let outcome = apply(history, &[project(1, "api", 5)], &options, t2).unwrap();
    assert_eq!(outcome.summary.changed, 1);
    let versions = versions_by_key(&outcome.records, &options.key_fields);
    let chain = &versions["1"];
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].valid_to, Some(t2));
    assert_eq!(chain[1].valid_from, t2);
    assert!(chain[1].is_current);
    assert_eq!(current_records(&outcome.records).count(), 1);
}

#[test]
fn test_untracked_change_does_not_version() {
    let options = ScdOptions::for_resource(ResourceType::Projects).tracking(["name"]);
    let history = run(vec![], &[project(1, "api", 1)], &options, t0());
    let outcome = apply(history, &[project(1, "api", 99)], &options, t0() + Duration::hours(1)).unwrap();
    assert_eq!(outcome.summary.unchanged, 1);
    assert_eq!(outcome.records.len(), 1);
    // The stored values stay those of the open version
    assert_eq!(outcome.records[0].record.int("star_count"), Some(1));
}

#[test]
fn test_absent_keys_stay_open_unless_closing_is_requested() {
    let options = ScdOptions::for_resource(ResourceType::Projects);
    let history = run(vec![], &[project(1, "api", 1), project(2, "web", 1)], &options, t0());
    let later = t0() + Duration::days(1);

    let kept = run(history.clone(), &[project(1, "api", 1)], &options, later);
    assert_eq!(current_records(&kept).count(), 2);

    let closing = options.clone().close_missing(true);
    let outcome = apply(history, &[project(1, "api", 1)], &closing, later).unwrap();
    assert_eq!(outcome.summary.closed_missing, 1);
    assert_eq!(current_records(&outcome.records).count(), 1);
    assert_eq!(outcome.records.len(), 2, "closing never opens a replacement");
}

#[test]
fn test_duplicate_and_keyless_records_are_rejected() {
    let options = ScdOptions::for_resource(ResourceType::Projects);
    let keyless = NormalizedRecord::new(ResourceType::Projects).with("name", FieldValue::Text("x".into()));
    let outcome = apply(
        vec![],
        &[project(1, "first", 1), project(1, "second", 1), keyless],
        &options,
        t0(),
    )
    .unwrap();

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].record.text("name"), Some("first"));
    assert!(matches!(outcome.rejected[0].error, HistoryError::DuplicateKey { index: 1, .. }));
    assert!(matches!(outcome.rejected[1].error, HistoryError::MissingKey { index: 2, .. }));
}

#[test]
fn test_clock_skew_rejects_change() {
    let options = ScdOptions::for_resource(ResourceType::Projects);
    let history = run(vec![], &[project(1, "api", 1)], &options, t0());
    let outcome = apply(history, &[project(1, "api", 2)], &options, t0()).unwrap();
    assert!(matches!(outcome.rejected[0].error, HistoryError::ClockSkew { .. }));
    assert_eq!(outcome.records.len(), 1);
}

#[test]
fn test_composite_branch_key() {
    let branch = |project: i64, name: &str, sha: &str| {
        NormalizedRecord::new(ResourceType::Branches)
            .with("project_id", FieldValue::Int(project))
            .with("name", FieldValue::Text(name.into()))
            .with("commit_id", FieldValue::Text(sha.into()))
    };
    let options = ScdOptions::for_resource(ResourceType::Branches);
    let outcome = apply(
        vec![],
        &[branch(1, "main", "a"), branch(2, "main", "b")],
        &options,
        t0(),
    )
    .unwrap();
    assert_eq!(outcome.summary.inserted, 2);
    assert!(outcome.rejected.is_empty());
}

fn user(state: &str) -> NormalizedRecord {
    NormalizedRecord::new(ResourceType::Users)
        .with("id", FieldValue::Int(1))
        .with("state", FieldValue::Text(state.into()))
}

#[test]
fn test_active_then_blocked_then_unchanged() {
    let options = ScdOptions::for_resource(ResourceType::Users);
    let (t1, t2, t3) = (t0(), t0() + Duration::days(1), t0() + Duration::days(2));

    let after_first = run(vec![], &[user("active")], &options, t1);
    assert_eq!(after_first, vec![HistorizedRecord::open(user("active"), t1)]);

    let after_second = run(after_first, &[user("blocked")], &options, t2);
    assert_eq!(after_second.len(), 2);
    assert_eq!(after_second[0].record.text("state"), Some("active"));
    assert_eq!((after_second[0].valid_from, after_second[0].valid_to), (t1, Some(t2)));
    assert!(!after_second[0].is_current);
    assert_eq!(after_second[1].record.text("state"), Some("blocked"));
    assert_eq!((after_second[1].valid_from, after_second[1].valid_to), (t2, None));

    let after_third = run(after_second.clone(), &[user("blocked")], &options, t3);
    assert_eq!(after_third, after_second);
}

#[test]
fn test_versions_partition_time() {
    let options = ScdOptions::for_resource(ResourceType::Users);
    let states = ["active", "blocked", "blocked", "active", "deactivated", "active"];
    let mut history = Vec::new();
    for (day, state) in states.iter().enumerate() {
        history = run(history, &[user(state)], &options, t0() + Duration::days(day as i64));
    }

    let versions = versions_by_key(&history, &options.key_fields);
    let chain = &versions["1"];
    assert_eq!(chain.len(), 5);
    for pair in chain.windows(2) {
        assert_eq!(pair[0].valid_to, Some(pair[1].valid_from));
        assert_ne!(pair[0].record, pair[1].record);
    }
    assert_eq!(chain.iter().filter(|v| v.valid_to.is_none()).count(), 1);
}
