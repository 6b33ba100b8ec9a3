//! CLI parsing and binary behavior that needs no network

use assert_cmd::Command;
use clap::Parser;
use devops_etl::cli::{Cli, Commands};
use devops_etl::output::OutputFormat;
use devops_etl::ResourceType;
use std::path::PathBuf;

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("devops-etl").unwrap();
    for var in [
        "GITLAB_API_URL",
        "GITLAB_PRIVATE_TOKEN",
        "GITLAB_TIMEOUT",
        "GITLAB_MAX_RETRIES",
        "GITLAB_INSECURE",
        "DEVOPS_ETL_METRICS_ADDR",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_parse_extract_command() {
    let cli = Cli::try_parse_from([
        "devops-etl",
        "extract",
        "merge-requests",
        "--project",
        "group%2Fapp",
        "--since",
        "2024-01-01",
        "--output",
        "out/mrs.json",
        "--format",
        "json",
    ])
    .unwrap();

    let Commands::Extract(args) = cli.command else {
        panic!("expected extract");
    };
    assert_eq!(args.source.resource, ResourceType::MergeRequests);
    assert_eq!(args.source.project.as_deref(), Some("group%2Fapp"));
    assert_eq!(args.output, PathBuf::from("out/mrs.json"));
    assert_eq!(args.format, Some(OutputFormat::Json));
    assert!(!args.strict);
}

#[test]
fn test_parse_history_command_lists() {
    let cli = Cli::try_parse_from([
        "devops-etl",
        "history",
        "branches",
        "--project",
        "7",
        "--state",
        "state/branches.json",
        "--tracked",
        "commit_id,protected",
        "--close-missing",
    ])
    .unwrap();

    let Commands::History(args) = cli.command else {
        panic!("expected history");
    };
    let options = args.options();
    assert_eq!(options.key_fields, vec!["project_id", "name"]);
    assert!(options.close_missing);
    assert_eq!(args.tracked, vec!["commit_id", "protected"]);
}

#[test]
fn test_parse_user_scoped_events() {
    let cli = Cli::try_parse_from([
        "devops-etl",
        "extract",
        "events",
        "--user",
        "17",
        "--created-since",
        "2024-01-01",
        "-o",
        "events.csv",
    ])
    .unwrap();

    let Commands::Extract(args) = cli.command else {
        panic!("expected extract");
    };
    assert_eq!(args.source.resource, ResourceType::Events);
    let filter = args.source.filter().unwrap();
    assert_eq!(filter.user_id.as_deref(), Some("17"));
    assert!(filter.created_after.is_some());
    assert_eq!(filter.project_id, None);

    assert!(Cli::try_parse_from([
        "devops-etl", "extract", "events", "--user", "17", "--project", "1", "-o", "x.csv"
    ])
    .is_err());
}

#[test]
fn test_rejects_unknown_resource_and_bad_dates() {
    assert!(Cli::try_parse_from(["devops-etl", "extract", "wikis", "-o", "x.csv"]).is_err());
    assert!(Cli::try_parse_from([
        "devops-etl", "stats", "commits", "--project", "1", "--from", "2024-13-01", "--to", "2024-12-31"
    ])
    .is_err());
}

#[test]
fn test_validate_offline_without_config_fails() {
    bin()
        .args(["validate", "--offline"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_validate_offline_with_config_succeeds() {
    let output = bin()
        .args([
            "--api-url",
            "https://gitlab.example.com/api/v4",
            "--private-token",
            "secret",
            "validate",
            "--offline",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).unwrap();
    assert!(stdout.contains("https://gitlab.example.com/api/v4"));
    assert!(!stdout.contains("secret"));
}

#[test]
fn test_stats_rejects_inverted_window() {
    bin()
        .args([
            "--api-url",
            "https://gitlab.example.com/api/v4",
            "--private-token",
            "secret",
            "stats",
            "commits",
            "--project",
            "1",
            "--from",
            "2024-02-01",
            "--to",
            "2024-01-01",
        ])
        .assert()
        .failure();
}
