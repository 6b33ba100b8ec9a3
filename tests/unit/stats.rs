//! Unit tests for windowed reports over normalized records

use crate::support::{as_raw, scripted_client};
use devops_etl::cli::stats::request_filter;
use devops_etl::fetcher::extractor::ResourceExtractor;
use devops_etl::normalize::normalize_batch;
use devops_etl::stats::{compute, AggregateReport, DateWindow};
use devops_etl::ResourceType;
use chrono::NaiveDate;
use serde_json::json;

fn january() -> DateWindow {
    DateWindow::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    )
    .unwrap()
}

#[test]
fn test_commit_report_from_raw_payloads() {
    let raws = vec![
        as_raw(json!({ "id": "a", "author_name": "Ada", "created_at": "2024-01-02T10:00:00Z",
                       "stats": { "additions": 10, "deletions": 1 } })),
        as_raw(json!({ "id": "b", "author_name": "Ada", "created_at": "2024-01-02T11:00:00Z",
                       "stats": { "additions": 20, "deletions": 0 } })),
        as_raw(json!({ "id": "c", "author_name": "Bob", "created_at": "2024-01-03T09:00:00Z" })),
        // Outside the window
        as_raw(json!({ "id": "d", "author_name": "Bob", "created_at": "2024-02-01T09:00:00Z",
                       "stats": { "additions": 500 } })),
    ];
    let batch = normalize_batch(ResourceType::Commits, &raws);
    let report = compute(ResourceType::Commits, &batch.records, &january()).unwrap();

    let AggregateReport::Commits(commits) = report else {
        panic!("expected commit report");
    };
    assert_eq!(commits.total, 3);
    assert_eq!(commits.additions, 30);
    assert_eq!(commits.by_author["Ada"], 2);
    assert_eq!(commits.daily_activity.len(), 2);
}

#[test]
fn test_pipeline_report_serializes_with_resource_tag() {
    let raws = vec![
        as_raw(json!({ "id": 1, "status": "success", "ref": "main", "duration": 60,
                       "created_at": "2024-01-08T00:00:00Z" })),
        as_raw(json!({ "id": 2, "status": "failed", "ref": "main",
                       "started_at": "2024-01-09T00:00:00Z", "finished_at": "2024-01-09T00:02:00Z",
                       "created_at": "2024-01-09T00:00:00Z" })),
    ];
    let batch = normalize_batch(ResourceType::Pipelines, &raws);
    let report = compute(ResourceType::Pipelines, &batch.records, &january()).unwrap();
    let value = serde_json::to_value(&report).unwrap();

    assert_eq!(value["resource"], "pipelines");
    assert_eq!(value["success_rate"], 0.5);
    assert_eq!(value["avg_duration_secs"], 90.0);
    assert_eq!(value["weekly_distribution"]["2024-01-08"]["total"], 2);
}

#[test]
fn test_report_requests_cover_entities_created_in_window() {
    let extractor = ResourceExtractor::new(scripted_client([], 0, 100));
    let window = january();

    for resource in [ResourceType::MergeRequests, ResourceType::Issues] {
        let filter = request_filter(resource, "1", &window);
        let page = extractor.list_request(resource, &filter).unwrap().for_page(1);
        assert_eq!(page.query_value("created_after"), Some("2024-01-01T00:00:00Z"));
        assert_eq!(page.query_value("created_before"), Some("2024-01-31T23:59:59Z"));
        // An entity created in January but updated later must still be fetched
        assert_eq!(page.query_value("updated_before"), None);
        assert_eq!(page.query_value("updated_after"), None);
    }

    let filter = request_filter(ResourceType::Pipelines, "1", &window);
    let page = extractor
        .list_request(ResourceType::Pipelines, &filter)
        .unwrap()
        .for_page(1);
    assert_eq!(page.query_value("updated_after"), Some("2024-01-01T00:00:00Z"));
    assert_eq!(page.query_value("updated_before"), None);

    let filter = request_filter(ResourceType::Commits, "1", &window);
    let page = extractor.list_request(ResourceType::Commits, &filter).unwrap().for_page(1);
    assert_eq!(page.query_value("since"), Some("2024-01-01T00:00:00Z"));
    assert_eq!(page.query_value("until"), Some("2024-01-31T23:59:59Z"));
}

#[test]
fn test_merge_request_updated_after_window_still_counts() {
    let raws = vec![
        as_raw(json!({ "id": 1, "state": "merged", "author": { "username": "ada" },
                       "created_at": "2024-01-10T09:00:00Z",
                       "updated_at": "2024-03-02T09:00:00Z",
                       "merged_at": "2024-02-20T09:00:00Z" })),
        as_raw(json!({ "id": 2, "state": "opened", "author": { "username": "bob" },
                       "created_at": "2023-12-20T09:00:00Z",
                       "updated_at": "2024-01-05T09:00:00Z" })),
    ];
    let batch = normalize_batch(ResourceType::MergeRequests, &raws);
    let report = compute(ResourceType::MergeRequests, &batch.records, &january()).unwrap();
    match report {
        AggregateReport::MergeRequests(report) => {
            assert_eq!(report.total, 1);
            assert_eq!(report.merged, 1);
        }
        other => panic!("unexpected report: {other:?}"),
    }
}
