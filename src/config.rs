//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/bmprune/bmprune.toml`
//! 3. Environment variables: `BMPRUNE_*` prefix (`BMPRUNE_PROBE__WORKERS=4`)
//! 4. Command line flags (applied by the CLI layer)

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::application::services::{ProbeOptions, DEFAULT_USER_AGENT};
use crate::application::ApplicationError;
use crate::domain::{expand_env_vars, DEFAULT_MIN_STATUS};

const APP_NAME: &str = "bmprune";
const ENV_PREFIX: &str = "BMPRUNE";

/// Liveness probe configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProbeSettings {
    /// Per-request timeout in seconds, must be > 0
    pub timeout_secs: u64,
    pub max_redirects: usize,
    /// Requests per url including the first one
    pub max_attempts: u32,
    /// Concurrent connections
    pub workers: usize,
    /// Initial retry delay in milliseconds, doubled per retry
    pub backoff_ms: u64,
    pub user_agent: String,
    /// Lowest HTTP status counted as broken
    pub min_status: u16,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        let probe = ProbeOptions::default();
        Self {
            timeout_secs: probe.timeout.as_secs(),
            max_redirects: probe.max_redirects,
            max_attempts: probe.max_attempts,
            workers: probe.workers,
            backoff_ms: probe.backoff.as_millis() as u64,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            min_status: DEFAULT_MIN_STATUS,
        }
    }
}

impl ProbeSettings {
    /// Runtime options for the prober.
    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            max_redirects: self.max_redirects,
            max_attempts: self.max_attempts,
            workers: self.workers,
            backoff: Duration::from_millis(self.backoff_ms),
            user_agent: self.user_agent.clone(),
        }
    }

    fn apply(&self, raw: &RawProbeSettings) -> Self {
        Self {
            timeout_secs: raw.timeout_secs.unwrap_or(self.timeout_secs),
            max_redirects: raw.max_redirects.unwrap_or(self.max_redirects),
            max_attempts: raw.max_attempts.unwrap_or(self.max_attempts),
            workers: raw.workers.unwrap_or(self.workers),
            backoff_ms: raw.backoff_ms.unwrap_or(self.backoff_ms),
            user_agent: raw
                .user_agent
                .clone()
                .unwrap_or_else(|| self.user_agent.clone()),
            min_status: raw.min_status.unwrap_or(self.min_status),
        }
    }
}

/// Raw probe config: `None` means "not specified, inherit".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct RawProbeSettings {
    pub timeout_secs: Option<u64>,
    pub max_redirects: Option<usize>,
    pub max_attempts: Option<u32>,
    pub workers: Option<usize>,
    pub backoff_ms: Option<u64>,
    pub user_agent: Option<String>,
    pub min_status: Option<u16>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct RawSettings {
    pub bookmarks_path: Option<PathBuf>,
    pub probe: RawProbeSettings,
}

/// Unified configuration for bmprune.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Safari bookmark store (default: ~/Library/Safari/Bookmarks.plist)
    pub bookmarks_path: PathBuf,
    pub probe: ProbeSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bookmarks_path: default_bookmarks_path(),
            probe: ProbeSettings::default(),
        }
    }
}

fn default_bookmarks_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join("Library/Safari/Bookmarks.plist"))
        .unwrap_or_else(|| PathBuf::from("~/Library/Safari/Bookmarks.plist"))
}

/// Get the XDG config directory for bmprune.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join(format!("{APP_NAME}.toml")))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        let expanded = expand_env_vars(self.bookmarks_path.to_string_lossy().as_ref());
        self.bookmarks_path = PathBuf::from(expanded);
    }

    fn apply_file(&self, raw: &RawSettings) -> Self {
        Self {
            bookmarks_path: raw
                .bookmarks_path
                .clone()
                .unwrap_or_else(|| self.bookmarks_path.clone()),
            probe: self.probe.apply(&raw.probe),
        }
    }

    /// Load settings from the global config file and the environment.
    pub fn load() -> Result<Self, ApplicationError> {
        Self::load_from(global_config_path().as_deref())
    }

    /// Load settings with `config_file` as the file layer.
    ///
    /// A missing file is not an error; an unparsable one is.
    pub fn load_from(config_file: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(path) = config_file {
            if path.exists() {
                let raw = load_raw_settings(path)?;
                current = current.apply_file(&raw);
            }
        }

        let env = Config::builder()
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_err)?;
        current = current.apply_overrides(&env)?;

        current.expand_paths();
        current.validate()?;
        Ok(current)
    }

    /// Apply explicitly set keys from `config` (dotted keys, e.g. `probe.workers`).
    ///
    /// Values replace, they are explicit user overrides.
    pub fn apply_overrides(mut self, config: &Config) -> Result<Self, ApplicationError> {
        if let Some(val) = lookup::<String>(config, "bookmarks_path")? {
            self.bookmarks_path = PathBuf::from(val);
        }
        let probe = &mut self.probe;
        if let Some(val) = lookup(config, "probe.timeout_secs")? {
            probe.timeout_secs = val;
        }
        if let Some(val) = lookup(config, "probe.max_redirects")? {
            probe.max_redirects = val;
        }
        if let Some(val) = lookup(config, "probe.max_attempts")? {
            probe.max_attempts = val;
        }
        if let Some(val) = lookup(config, "probe.workers")? {
            probe.workers = val;
        }
        if let Some(val) = lookup(config, "probe.backoff_ms")? {
            probe.backoff_ms = val;
        }
        if let Some(val) = lookup(config, "probe.user_agent")? {
            probe.user_agent = val;
        }
        if let Some(val) = lookup(config, "probe.min_status")? {
            probe.min_status = val;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ApplicationError> {
        if !(100..=599).contains(&self.probe.min_status) {
            return Err(ApplicationError::config(format!(
                "probe.min_status must be a valid HTTP status, got {}",
                self.probe.min_status
            )));
        }
        self.probe.probe_options().validate()
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# bmprune configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/bmprune/bmprune.toml
#   Env:    BMPRUNE_* environment variables, nested keys use "__"
#           e.g. BMPRUNE_PROBE__WORKERS=4
#   Flags:  command line options

# Safari bookmark store
# bookmarks_path = "~/Library/Safari/Bookmarks.plist"

[probe]
# Per-request timeout in seconds (must be > 0)
# timeout_secs = 10

# Redirects followed before giving up
# max_redirects = 10

# Requests per url; timeouts and dropped connections are retried
# max_attempts = 3

# Concurrent connections
# workers = 8

# Delay before the first retry, doubled for each further retry
# backoff_ms = 500

# user_agent = "SafariBookmarkPruner/1.0"

# Statuses at or above this count as broken
# min_status = 300
"#
        .to_string()
    }
}

fn lookup<T: DeserializeOwned>(config: &Config, key: &str) -> Result<Option<T>, ApplicationError> {
    match config.get::<T>(key) {
        Ok(val) => Ok(Some(val)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(config_err(e)),
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
