use std::path::PathBuf;

use tempfile::TempDir;

use bmprune::application::ApplicationError;
use bmprune::config::{ProbeSettings, Settings};

#[test]
fn given_config_file_when_loading_then_file_values_win_over_defaults() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("bmprune.toml");
    std::fs::write(
        &config,
        r#"
bookmarks_path = "/data/Safari/Bookmarks.plist"

[probe]
workers = 3
min_status = 400
user_agent = "LinkSweeper/2.0"
"#,
    )
    .unwrap();

    // Act
    let settings = Settings::load_from(Some(config.as_path())).unwrap();

    // Assert
    assert_eq!(
        settings.bookmarks_path,
        PathBuf::from("/data/Safari/Bookmarks.plist")
    );
    assert_eq!(settings.probe.workers, 3);
    assert_eq!(settings.probe.min_status, 400);
    assert_eq!(settings.probe.user_agent, "LinkSweeper/2.0");
    assert_eq!(settings.probe.timeout_secs, ProbeSettings::default().timeout_secs);
}

#[test]
fn given_missing_config_file_when_loading_then_defaults_apply() {
    let temp = TempDir::new().unwrap();

    let settings = Settings::load_from(Some(temp.path().join("absent.toml").as_path())).unwrap();

    assert_eq!(settings.probe, ProbeSettings::default());
}

#[test]
fn given_broken_toml_when_loading_then_config_error() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("bmprune.toml");
    std::fs::write(&config, "[probe\nworkers = ").unwrap();

    let result = Settings::load_from(Some(config.as_path()));

    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}

#[test]
fn given_zero_workers_in_file_when_loading_then_config_error() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("bmprune.toml");
    std::fs::write(&config, "[probe]\nworkers = 0\n").unwrap();

    let result = Settings::load_from(Some(config.as_path()));

    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}

#[test]
fn given_settings_when_converted_then_probe_options_carry_durations() {
    let probe = ProbeSettings {
        timeout_secs: 7,
        backoff_ms: 250,
        ..ProbeSettings::default()
    };

    let options = probe.probe_options();

    assert_eq!(options.timeout.as_secs(), 7);
    assert_eq!(options.backoff.as_millis(), 250);
    assert_eq!(options.workers, probe.workers);
}
