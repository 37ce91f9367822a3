//! Configuration types for hl-tape

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::lag::Lag;
use crate::overlay::Palette;
use crate::telemetry::LogFormat;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub lags: LagsConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Analytics database connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// HTTP endpoint of the ClickHouse server
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_database_user")]
    pub user: String,

    #[serde(default)]
    pub password: Option<String>,

    /// Default database for unqualified table names
    #[serde(default)]
    pub database: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_database_url() -> String {
    "http://localhost:8123".to_string()
}
fn default_database_user() -> String {
    "default".to_string()
}
fn default_timeout_secs() -> u64 {
    300
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            user: default_database_user(),
            password: None,
            database: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Replay log location and read limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    #[serde(default = "default_replay_dir")]
    pub directory: PathBuf,

    /// Cap on lines read per file
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

fn default_replay_dir() -> PathBuf {
    PathBuf::from("./replay")
}
fn default_max_rows() -> usize {
    crate::replay::DEFAULT_MAX_ROWS
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            directory: default_replay_dir(),
            max_rows: default_max_rows(),
        }
    }
}

/// Lags used when none are given on the command line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LagsConfig {
    #[serde(default = "default_lags")]
    pub default: Vec<Lag>,
}

fn default_lags() -> Vec<Lag> {
    ["1s", "5s", "30s", "1m", "5m"]
        .iter()
        .filter_map(|s| Lag::parse(s).ok())
        .collect()
}

impl Default for LagsConfig {
    fn default() -> Self {
        Self {
            default: default_lags(),
        }
    }
}

/// Overlay styling
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayConfig {
    #[serde(default)]
    pub palette: Palette,
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialize() {
        let toml = r##"
            [database]
            url = "http://clickhouse:8123"
            user = "analyst"
            password = "secret"
            timeout_secs = 60

            [replay]
            directory = "/data/replay/run-42"
            max_rows = 1000

            [lags]
            default = ["250ms", "1s", "1min"]

            [overlay]
            palette = ["#000000", "#ffffff"]

            [telemetry]
            log_level = "debug"
            format = "json"
        "##;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.url, "http://clickhouse:8123");
        assert_eq!(config.database.password.as_deref(), Some("secret"));
        assert!(config.database.database.is_none());
        assert_eq!(config.replay.max_rows, 1000);
        assert_eq!(config.lags.default.len(), 3);
        assert_eq!(config.lags.default[2].label(), "1min");
        assert_eq!(config.overlay.palette.len(), 2);
        assert_eq!(config.telemetry.format, LogFormat::Json);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.database.url, "http://localhost:8123");
        assert_eq!(config.database.user, "default");
        assert_eq!(config.replay.max_rows, 50_000);
        assert_eq!(config.lags.default.len(), 5);
        assert_eq!(config.overlay.palette, Palette::category20());
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.format, LogFormat::Pretty);
    }

    #[test]
    fn test_invalid_lag_rejected() {
        let toml = r#"
            [lags]
            default = ["5 parsecs"]
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_empty_palette_rejected() {
        let toml = r#"
            [overlay]
            palette = []
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(include_str!("../config.toml.example")).unwrap();
        assert!(!config.lags.default.is_empty());
    }
}
