//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/drivesense/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/drivesense/` (~/.config/drivesense/)
//! - State/Logs/Session: `$XDG_STATE_HOME/drivesense/` (~/.local/state/drivesense/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Base URLs of the three backing services
    #[serde(default)]
    pub services: ServicesConfig,

    /// Poll intervals
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the users, drivers and events services live
#[derive(Debug, Deserialize, Clone)]
pub struct ServicesConfig {
    #[serde(default = "default_users_url")]
    pub users_url: String,

    #[serde(default = "default_drivers_url")]
    pub drivers_url: String,

    #[serde(default = "default_events_url")]
    pub events_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            users_url: default_users_url(),
            drivers_url: default_drivers_url(),
            events_url: default_events_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_users_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_drivers_url() -> String {
    "http://localhost:5001".to_string()
}

fn default_events_url() -> String {
    "http://localhost:5002".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Poll cadence for each synchronized view
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Driver roster refresh interval
    #[serde(default = "default_roster_interval")]
    pub roster_interval_ms: u64,

    /// Event timeline refresh interval
    #[serde(default = "default_timeline_interval")]
    pub timeline_interval_ms: u64,

    /// Live telemetry gauge refresh interval
    #[serde(default = "default_telemetry_interval")]
    pub telemetry_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            roster_interval_ms: default_roster_interval(),
            timeline_interval_ms: default_timeline_interval(),
            telemetry_interval_ms: default_telemetry_interval(),
        }
    }
}

fn default_roster_interval() -> u64 {
    3000
}

fn default_timeline_interval() -> u64 {
    1000
}

fn default_telemetry_interval() -> u64 {
    1000
}

impl SyncConfig {
    pub fn roster_interval(&self) -> Duration {
        Duration::from_millis(self.roster_interval_ms)
    }

    pub fn timeline_interval(&self) -> Duration {
        Duration::from_millis(self.timeline_interval_ms)
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms)
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("sync.roster_interval_ms", self.sync.roster_interval_ms),
            ("sync.timeline_interval_ms", self.sync.timeline_interval_ms),
            ("sync.telemetry_interval_ms", self.sync.telemetry_interval_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }

        let urls = [
            ("services.users_url", &self.services.users_url),
            ("services.drivers_url", &self.services.drivers_url),
            ("services.events_url", &self.services.events_url),
        ];
        for (name, url) in urls {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "{} must be an http(s) URL, got {:?}",
                    name, url
                )));
            }
        }

        if self.services.timeout_secs == 0 {
            return Err(Error::Config(
                "services.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/drivesense/config.toml` (~/.config/drivesense/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("drivesense").join("config.toml")
    }

    /// Returns the state directory path (for logs and the session file)
    ///
    /// `$XDG_STATE_HOME/drivesense/` (~/.local/state/drivesense/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("drivesense")
    }

    /// Returns today's log file; the appender rolls over at midnight UTC
    pub fn log_path() -> PathBuf {
        Self::state_dir().join(format!(
            "drivesense.{}.log",
            chrono::Utc::now().format("%Y-%m-%d")
        ))
    }

    /// Returns the persisted session path
    pub fn session_path() -> PathBuf {
        Self::state_dir().join("session.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.services.drivers_url, "http://localhost:5001");
        assert_eq!(config.sync.roster_interval_ms, 3000);
        assert_eq!(config.sync.timeline_interval_ms, 1000);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[services]
drivers_url = "https://drivers.example.com"
timeout_secs = 5

[sync]
roster_interval_ms = 5000

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.services.drivers_url, "https://drivers.example.com");
        assert_eq!(config.services.users_url, "http://localhost:5000");
        assert_eq!(config.services.timeout_secs, 5);
        assert_eq!(config.sync.roster_interval(), Duration::from_secs(5));
        assert_eq!(config.sync.telemetry_interval_ms, 1000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config: Config = toml::from_str("[sync]\ntimeline_interval_ms = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_url_rejected() {
        let config: Config = toml::from_str("[services]\nevents_url = \"localhost\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_session_path_in_state_dir() {
        assert!(Config::session_path().ends_with("drivesense/session.json"));
    }
}
