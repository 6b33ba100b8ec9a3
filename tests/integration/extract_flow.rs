//! End-to-end extraction against a scripted transport

use crate::support::{scripted_client, users_page};
use devops_etl::fetcher::extractor::{ExtractFilter, ResourceExtractor};
use devops_etl::fetcher::AttemptFailure;
use devops_etl::normalize::normalize_batch;
use devops_etl::{FetcherError, ResourceType};
use chrono::NaiveDate;
use futures_util::TryStreamExt;
use serde_json::json;

#[tokio::test]
async fn test_users_across_three_pages() {
    let client = scripted_client(
        [Ok(users_page(0, 100)), Ok(users_page(100, 100)), Ok(users_page(200, 5))],
        3,
        100,
    );
    let extractor = ResourceExtractor::new(client);

    let raws = extractor
        .extract_all(ResourceType::Users, &ExtractFilter::default())
        .await
        .unwrap();
    assert_eq!(raws.len(), 205);
    assert_eq!(extractor.client().transport().calls(), 3);

    let batch = normalize_batch(ResourceType::Users, &raws);
    assert!(batch.rejected.is_empty());
    assert_eq!(batch.records[204].int("id"), Some(204));
}

#[tokio::test]
async fn test_project_scoped_commits_are_stamped_and_filtered() {
    let page = json!([
        { "id": "a", "author_email": "Ada@Example.com", "created_at": "2024-03-01T00:00:00Z" },
        { "id": "b", "author_email": "bob@example.com", "created_at": "2024-03-02T00:00:00Z" },
        { "id": "c", "created_at": "2024-03-03T00:00:00Z" },
    ]);
    let extractor = ResourceExtractor::new(scripted_client([Ok(page)], 0, 100));
    let filter = ExtractFilter::default()
        .project("42")
        .since(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        .until(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap())
        .author_email("ada@example.com");

    let raws: Vec<_> = extractor
        .extract(ResourceType::Commits, &filter)
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(raws.len(), 1);
    assert_eq!(raws[0]["id"], "a");
    assert_eq!(raws[0]["project_id"], 42);

    let request = &extractor.client().transport().requests()[0];
    assert!(request.path.starts_with("/projects/42/"), "path was {}", request.path);
    assert_eq!(request.query_value("since"), Some("2024-03-01T00:00:00Z"));
    assert_eq!(request.query_value("until"), Some("2024-03-31T23:59:59Z"));
}

#[tokio::test]
async fn test_missing_project_fails_before_any_request() {
    let extractor = ResourceExtractor::new(scripted_client([], 0, 100));
    let result = extractor.extract(ResourceType::Pipelines, &ExtractFilter::default());
    assert!(matches!(result, Err(FetcherError::Configuration(_))));
    assert_eq!(extractor.client().transport().calls(), 0);
}

#[tokio::test]
async fn test_unknown_resource_name() {
    let extractor = ResourceExtractor::new(scripted_client([], 0, 100));
    let result = extractor.extract_named("wikis", &ExtractFilter::default());
    assert!(matches!(result, Err(FetcherError::UnknownResource(_))));
}

#[tokio::test]
async fn test_auth_failure_aborts_extraction_after_one_attempt() {
    let extractor = ResourceExtractor::new(scripted_client(
        [Err(AttemptFailure::Auth { status: 401 }), Ok(users_page(0, 1))],
        5,
        100,
    ));
    let err = extractor
        .extract_all(ResourceType::Users, &ExtractFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FetcherError::Authentication { .. }));
    assert_eq!(extractor.client().transport().calls(), 1);
}

#[tokio::test]
async fn test_single_lookup() {
    let extractor = ResourceExtractor::new(scripted_client(
        [Ok(json!({ "id": 5, "username": "eve" })), Err(AttemptFailure::NotFound)],
        3,
        100,
    ));
    let found = extractor.get_by_id(ResourceType::Users, "5", None).await.unwrap();
    assert_eq!(found.unwrap()["username"], "eve");

    let missing = extractor.get_by_id(ResourceType::Users, "6", None).await.unwrap();
    assert!(missing.is_none());
    assert_eq!(extractor.client().transport().requests()[1].path, "/users/6");
}

#[tokio::test]
async fn test_project_members_are_keyed_per_project() {
    let page = json!([
        { "id": 5, "username": "ada", "access_level": 40, "created_at": "2024-01-02T00:00:00Z" },
        { "id": 6, "username": "bob", "access_level": 30, "expires_at": "2024-12-31" },
    ]);
    let extractor = ResourceExtractor::new(scripted_client([Ok(page)], 0, 100));
    let raws = extractor
        .extract_all(ResourceType::ProjectMembers, &ExtractFilter::default().project("42"))
        .await
        .unwrap();

    let request = &extractor.client().transport().requests()[0];
    assert_eq!(request.path, "/projects/42/members/all");

    let batch = normalize_batch(ResourceType::ProjectMembers, &raws);
    assert!(batch.rejected.is_empty());
    assert_eq!(batch.records[0].int("project_id"), Some(42));
    assert_eq!(batch.records[0].int("access_level"), Some(40));
    assert_eq!(
        batch.records[1].get("expires_at"),
        &devops_etl::FieldValue::Date(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap())
    );
}

#[tokio::test]
async fn test_user_events_flatten_push_data() {
    let page = json!([
        { "id": 900, "project_id": 42, "action_name": "pushed to",
          "author": { "username": "ada" },
          "push_data": { "ref": "main", "commit_count": 3 },
          "created_at": "2024-03-05T10:00:00Z" },
    ]);
    let extractor = ResourceExtractor::new(scripted_client([Ok(page)], 0, 100));
    let raws = extractor
        .extract_all(ResourceType::Events, &ExtractFilter::default().user("17"))
        .await
        .unwrap();

    let request = &extractor.client().transport().requests()[0];
    assert_eq!(request.path, "/users/17/events");

    let batch = normalize_batch(ResourceType::Events, &raws);
    let event = &batch.records[0];
    assert_eq!(event.text("author"), Some("ada"));
    assert_eq!(event.text("push_ref"), Some("main"));
    assert_eq!(event.int("push_commit_count"), Some(3));
}
