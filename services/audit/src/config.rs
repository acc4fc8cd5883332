use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::confirm::RunMode;

/// Errors that can occur while assembling the audit configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("--report and --yes cannot be used together")]
    ConflictingModes,

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Main configuration for the audit service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Event archive layout and thresholds
    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Prometheus exporter port; no exporter when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Append log output to this file instead of stderr
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// MySQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Run OPTIMIZE TABLE after a pass that deleted rows
    #[serde(default)]
    pub optimize_tables: bool,
}

/// Event archive configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Root of the `<monitor>/<event>` directory tree
    #[serde(default = "default_events_path")]
    pub events_path: PathBuf,
    /// Directory holding loose rendered images
    #[serde(default = "default_images_path")]
    pub images_path: PathBuf,
    /// Grace period before a discrepancy is acted on
    #[serde(default = "default_min_age_secs")]
    pub min_age_secs: u64,
    /// Newest event directories per monitor that get a measured age
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,
    /// Loose images older than this are swept
    #[serde(default = "default_image_retention_secs")]
    pub image_retention_secs: u64,
    /// File extensions treated as loose images
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

// Default value functions
fn default_service_name() -> String {
    "archive-audit".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_max_connections() -> u32 {
    2
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_events_path() -> PathBuf {
    PathBuf::from("/var/cache/nier/events")
}

fn default_images_path() -> PathBuf {
    PathBuf::from("/var/cache/nier/images")
}

fn default_min_age_secs() -> u64 {
    300 // 5 minutes
}

fn default_recent_window() -> usize {
    25
}

fn default_image_retention_secs() -> u64 {
    900 // 15 minutes
}

fn default_image_extensions() -> Vec<String> {
    vec!["jpg".to_string(), "gif".to_string(), "wbmp".to_string()]
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            events_path: default_events_path(),
            images_path: default_images_path(),
            min_age_secs: default_min_age_secs(),
            recent_window: default_recent_window(),
            image_retention_secs: default_image_retention_secs(),
            image_extensions: default_image_extensions(),
        }
    }
}

impl DatabaseConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Config {
    /// Load configuration from config files and the environment
    ///
    /// `extra` is an additional file given on the command line; it is
    /// required when present and overrides the standard locations.
    pub fn load(extra: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            // Start with default values
            .set_default("service.name", "archive-audit")?
            .set_default("logging.level", "info")?
            // Add config files if present
            .add_source(config::File::with_name("config/audit").required(false))
            .add_source(config::File::with_name("/etc/nier/audit").required(false));

        if let Some(path) = extra {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            // Override with environment variables
            // AUDIT__DATABASE__URL -> database.url
            .add_source(
                config::Environment::with_prefix("AUDIT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::MissingRequired("database.url".to_string()));
        }

        if self.archive.events_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired(
                "archive.events_path".to_string(),
            ));
        }

        if self.archive.images_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired(
                "archive.images_path".to_string(),
            ));
        }

        if self.archive.recent_window == 0 {
            return Err(ConfigError::InvalidValue {
                key: "archive.recent_window".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "logging.format".to_string(),
                    message: format!("expected \"pretty\" or \"json\", got \"{}\"", other),
                })
            }
        }

        Ok(())
    }

    /// Combine the loaded configuration with the command-line run mode
    pub fn audit_settings(&self, mode: RunMode, delay: Duration) -> AuditSettings {
        AuditSettings {
            mode,
            delay,
            events_path: self.archive.events_path.clone(),
            images_path: self.archive.images_path.clone(),
            min_age: Duration::from_secs(self.archive.min_age_secs),
            recent_window: self.archive.recent_window,
            image_retention: Duration::from_secs(self.archive.image_retention_secs),
            image_extensions: self.archive.image_extensions.clone(),
            optimize_tables: self.database.optimize_tables,
        }
    }
}

/// Immutable settings for a run, handed to every audit component
#[derive(Debug, Clone)]
pub struct AuditSettings {
    /// How destructive actions are confirmed
    pub mode: RunMode,
    /// Pause between passes; zero runs a single pass
    pub delay: Duration,
    pub events_path: PathBuf,
    pub images_path: PathBuf,
    pub min_age: Duration,
    pub recent_window: usize,
    pub image_retention: Duration,
    pub image_extensions: Vec<String>,
    pub optimize_tables: bool,
}

impl AuditSettings {
    /// Settings with the stock thresholds, rooted at the given directories
    pub fn new(events_path: impl Into<PathBuf>, images_path: impl Into<PathBuf>) -> Self {
        let archive = ArchiveConfig::default();
        Self {
            mode: RunMode::Interactive,
            delay: Duration::ZERO,
            events_path: events_path.into(),
            images_path: images_path.into(),
            min_age: Duration::from_secs(archive.min_age_secs),
            recent_window: archive.recent_window,
            image_retention: Duration::from_secs(archive.image_retention_secs),
            image_extensions: archive.image_extensions,
            optimize_tables: false,
        }
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn is_continuous(&self) -> bool {
        !self.delay.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            service: ServiceConfig {
                name: default_service_name(),
                metrics_port: None,
            },
            logging: LoggingConfig::default(),
            database: DatabaseConfig {
                url: "mysql://audit@localhost/surveillance".to_string(),
                max_connections: default_max_connections(),
                connect_timeout_secs: default_connect_timeout_secs(),
                optimize_tables: false,
            },
            archive: ArchiveConfig::default(),
        }
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_min_age_secs(), 300);
        assert_eq!(default_recent_window(), 25);
        assert_eq!(default_image_retention_secs(), 900);
        assert_eq!(default_image_extensions(), vec!["jpg", "gif", "wbmp"]);
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut config = test_config();
        config.archive.recent_window = 0;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "archive.recent_window"
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_log_format() {
        let mut config = test_config();
        config.logging.format = "xml".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_audit_settings_from_config() {
        let settings = test_config().audit_settings(RunMode::Report, Duration::from_secs(60));

        assert_eq!(settings.mode, RunMode::Report);
        assert!(settings.is_continuous());
        assert_eq!(settings.min_age, Duration::from_secs(300));
        assert_eq!(settings.image_retention, Duration::from_secs(900));
        assert_eq!(settings.events_path, PathBuf::from("/var/cache/nier/events"));
    }

    #[test]
    fn test_database_connect_timeout() {
        let mut config = test_config();
        config.database.connect_timeout_secs = 5;

        assert_eq!(config.database.connect_timeout(), Duration::from_secs(5));
    }
}
