//! Command dispatch with injected filesystem and HTTP client

mod common;

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use tempfile::TempDir;

use bmprune::application::ApplicationError;
use bmprune::cli::commands::{dispatch, load_settings};
use bmprune::cli::{Cli, CliError};
use bmprune::domain::StoreFormat;
use bmprune::exitcode;
use bmprune::infrastructure::di::ServiceContainer;
use bmprune::infrastructure::traits::HttpClient;

use common::*;

/// Parse `args` with an empty config file and the store at `store`.
fn parse(temp: &TempDir, store: &Path, args: &[&str]) -> Cli {
    let config = temp.path().join("bmprune.toml");
    if !config.exists() {
        std::fs::write(&config, "").unwrap();
    }
    let mut argv = vec![
        "bmprune".to_string(),
        "--config".to_string(),
        config.display().to_string(),
        "--bookmarks-path".to_string(),
        store.display().to_string(),
    ];
    argv.extend(args.iter().map(|a| a.to_string()));
    Cli::parse_from(argv)
}

fn container(cli: &Cli, http: Arc<dyn HttpClient>) -> ServiceContainer {
    ServiceContainer::with_deps(
        load_settings(cli).unwrap(),
        real_fs(),
        Some(http),
        Arc::new(AtomicBool::new(false)),
    )
}

#[test]
fn given_list_with_csv_output_file_when_dispatching_then_rows_written() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let store = write_store(&temp, &sample_store(), StoreFormat::Binary);
    let report = temp.path().join("out/list.csv");
    let cli = parse(
        &temp,
        &store,
        &["list", "-s", "laravel", "-f", "csv", "-o", report.to_str().unwrap()],
    );

    // Act
    dispatch(&cli.command, &container(&cli, Arc::new(ScriptedHttp::new()))).unwrap();

    // Assert
    let text = std::fs::read_to_string(&report).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "path,title,url,domain,added_at,modified_at");
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("BookmarksBar/Dev,Laravel Routing,"));
}

#[test]
fn given_prune_with_json_report_when_dispatching_then_dead_link_removed() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let store = write_store(&temp, &sample_store(), StoreFormat::Xml);
    let report = temp.path().join("removed.json");
    let cli = parse(
        &temp,
        &store,
        &["prune", "--retries", "0", "-f", "json", "-o", report.to_str().unwrap()],
    );
    let http = Arc::new(ScriptedHttp::new().with(DEAD_URL, vec![Ok(410)]));

    // Act
    dispatch(&cli.command, &container(&cli, http.clone())).unwrap();

    // Assert
    let rows: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(rows[0]["url"], DEAD_URL);
    assert_eq!(rows[0]["reason"], "HTTP status 410");
    assert_eq!(backups_in(temp.path()).len(), 1);
    assert_eq!(StoreFormat::detect(&std::fs::read(&store).unwrap()), StoreFormat::Xml);
}

#[test]
fn given_remove_dry_run_when_dispatching_then_store_unchanged() {
    let temp = TempDir::new().unwrap();
    let store = write_store(&temp, &sample_store(), StoreFormat::Binary);
    let before = std::fs::read(&store).unwrap();
    let report = temp.path().join("plan.ndjson");
    let cli = parse(
        &temp,
        &store,
        &[
            "remove",
            "-d",
            "news.ycombinator.com,www.rust-lang.org",
            "-n",
            "-f",
            "ndjson",
            "-o",
            report.to_str().unwrap(),
        ],
    );

    dispatch(&cli.command, &container(&cli, Arc::new(ScriptedHttp::new()))).unwrap();

    assert_eq!(std::fs::read(&store).unwrap(), before);
    assert!(backups_in(temp.path()).is_empty());
    assert_eq!(std::fs::read_to_string(&report).unwrap().lines().count(), 2);
}

#[test]
fn given_retries_flag_when_loading_settings_then_attempts_include_first_request() {
    let temp = TempDir::new().unwrap();
    let store = temp.path().join("Bookmarks.plist");
    let cli = parse(&temp, &store, &["check", "--retries", "4", "-w", "2"]);

    let settings = load_settings(&cli).unwrap();

    assert_eq!(settings.probe.max_attempts, 5);
    assert_eq!(settings.probe.workers, 2);
    assert_eq!(settings.bookmarks_path, store);
}

#[test]
fn given_out_of_range_min_status_when_parsing_then_rejected() {
    let result = Cli::try_parse_from(["bmprune", "check", "--min-status", "99"]);

    assert!(result.is_err());
}

#[test]
fn given_remove_without_domain_when_parsing_then_rejected() {
    let result = Cli::try_parse_from(["bmprune", "remove"]);

    assert!(result.is_err());
}

#[test]
fn given_missing_store_when_dispatching_then_noinput_exit_code() {
    let temp = TempDir::new().unwrap();
    let cli = parse(&temp, &temp.path().join("nope.plist"), &["tree"]);

    let err = dispatch(&cli.command, &container(&cli, Arc::new(ScriptedHttp::new()))).unwrap_err();

    assert_eq!(err.exit_code(), exitcode::NOINPUT);
}

#[test]
fn given_cancelled_run_when_mapping_error_then_exit_code_is_130() {
    let err: CliError = ApplicationError::Cancelled.into();

    assert_eq!(err.exit_code(), 130);
}
