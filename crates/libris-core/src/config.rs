//! Configuration module for Libris.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::policy::{DEFAULT_LOAN_PERIOD_DAYS, DEFAULT_MAX_RENEWALS};
use crate::domain::{DomainError, LoanPolicy};
use crate::usecases::RetryPolicy;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Libris.
///
/// Missing sections and fields fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub lending: LendingConfig,
    pub logging: LoggingConfig,
}

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the database file.
    pub path: PathBuf,
    /// Size of the connection pool.
    pub max_connections: u32,
    /// How long a connection waits on a locked database (in milliseconds).
    pub busy_timeout_ms: u64,
}

/// Lending rules and engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LendingConfig {
    /// Length of a loan and of each renewal (in days).
    pub loan_period_days: u32,
    /// Renewals allowed per loan.
    pub max_renewals: u32,
    /// Largest page a listing may request.
    pub max_page_size: u32,
    /// Retries after a storage conflict before giving up.
    pub conflict_retries: u32,
    /// Pause between conflict retries (in milliseconds).
    pub retry_backoff_ms: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `pretty` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/libris/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("libris")
            .join("config.yaml")
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl LendingConfig {
    /// The loan policy described by this section.
    pub fn policy(&self) -> Result<LoanPolicy, DomainError> {
        LoanPolicy::new(self.loan_period_days, self.max_renewals)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.conflict_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for DatabaseConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("libris");
        Self {
            path: data_dir.join("libris.db"),
            max_connections: 5,
            busy_timeout_ms: 5000,
        }
    }
}

impl Default for LendingConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            loan_period_days: DEFAULT_LOAN_PERIOD_DAYS,
            max_renewals: DEFAULT_MAX_RENEWALS,
            max_page_size: 100,
            conflict_retries: retry.retries,
            retry_backoff_ms: retry.backoff.as_millis() as u64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"lending.max_page_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["pretty", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- database ---
        if self.database.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "database.path".into(),
                message: "must not be empty".into(),
            });
        }
        if self.database.max_connections == 0 {
            errors.push(ValidationError {
                field: "database.max_connections".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- lending ---
        if self.lending.loan_period_days == 0 {
            errors.push(ValidationError {
                field: "lending.loan_period_days".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.lending.max_page_size == 0 {
            errors.push(ValidationError {
                field: "lending.max_page_size".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.lending.conflict_retries > 100 {
            errors.push(ValidationError {
                field: "lending.conflict_retries".into(),
                message: "must be in range 0..=100".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}', expected one of: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use libris_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .database_path(PathBuf::from("/var/lib/libris/libris.db"))
///     .lending_loan_period_days(14)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- database ---

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.database.path = path;
        self
    }

    pub fn database_max_connections(mut self, n: u32) -> Self {
        self.config.database.max_connections = n;
        self
    }

    pub fn database_busy_timeout_ms(mut self, ms: u64) -> Self {
        self.config.database.busy_timeout_ms = ms;
        self
    }

    // --- lending ---

    pub fn lending_loan_period_days(mut self, days: u32) -> Self {
        self.config.lending.loan_period_days = days;
        self
    }

    pub fn lending_max_renewals(mut self, n: u32) -> Self {
        self.config.lending.max_renewals = n;
        self
    }

    pub fn lending_max_page_size(mut self, n: u32) -> Self {
        self.config.lending.max_page_size = n;
        self
    }

    pub fn lending_conflict_retries(mut self, n: u32) -> Self {
        self.config.lending.conflict_retries = n;
        self
    }

    pub fn lending_retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.lending.retry_backoff_ms = ms;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
