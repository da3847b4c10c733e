//! Application configuration loaded from environment variables.
//!
//! The configuration is read once at startup, validated, and then shared
//! read-only (behind `Arc`) with the middleware and handlers. Nothing reads
//! the environment after that.
//!
//! # Request Pipeline
//!
//! - `RUN_MODE`: `release` (access log + alerting) or `debug` (HTTP trace, no alerts)
//! - `DEFAULT_CONTEXT_TIMEOUT_SECS`: per-request deadline (default: 60)
//! - `RATE_LIMIT_RULES`: `prefix:fill_ms:capacity:quantum`, comma-separated
//!   (default: `/auth:1000:10:10`)
//!
//! # Alerting
//!
//! - `ALERT_RECIPIENTS`: comma-separated addresses; empty disables alerts
//! - `ALERT_QUEUE_CAPACITY`, `ALERT_MAX_RETRIES`, `ALERT_RETRY_BASE_DELAY_MS`,
//!   `ALERT_RATE_PER_MINUTE`
//!
//! # Authentication
//!
//! - `APP_KEY` / `APP_SECRET`: credentials accepted by `POST /auth`.
//!   Token checks on `/api/v1` are disabled while `APP_SECRET` is unset.
//! - `TOKEN_TTL_SECS`: token lifetime (default: 7200)

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::limiter::{BucketRule, parse_rules};

/// Default rule set: the auth endpoint allows 10 requests per second.
pub const DEFAULT_RATE_LIMIT_RULES: &str = "/auth:1000:10:10";

/// Server run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Human-readable HTTP tracing, recovery without operator alerts.
    Debug,
    /// JSON logs, access log capture and operator alerts.
    #[default]
    Release,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(RunMode::Debug),
            "release" => Ok(RunMode::Release),
            other => Err(format!("unknown run mode {other:?}, expected debug or release")),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Debug => write!(f, "debug"),
            RunMode::Release => write!(f, "release"),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 8000)
    pub port: u16,

    /// Run mode (default: release)
    pub run_mode: RunMode,

    /// Maximum request body size in bytes (default: 10MB).
    /// Also bounds the request body captured by the access log.
    pub max_request_body_size: usize,

    /// Allowed CORS origins, `*` for any
    pub cors_allowed_origins: Vec<String>,

    // =========================================================================
    // Request Pipeline
    // =========================================================================
    /// Deadline applied to every request (default: 60 seconds)
    pub default_context_timeout: Duration,

    /// Ordered token bucket rules
    pub rate_limit_rules: Vec<BucketRule>,

    // =========================================================================
    // Authentication
    // =========================================================================
    /// App key accepted by `POST /auth`
    pub app_key: String,

    /// App secret accepted by `POST /auth` (None = token auth disabled)
    pub app_secret: Option<String>,

    /// Lifetime of issued tokens
    pub token_ttl: Duration,

    // =========================================================================
    // Pagination
    // =========================================================================
    pub default_page_size: u32,
    pub max_page_size: u32,

    // =========================================================================
    // Alerting
    // =========================================================================
    /// Recipients of panic alerts (empty = alerts disabled)
    pub alert_recipients: Vec<String>,

    /// Bound of the alert queue; alerts beyond it are dropped
    pub alert_queue_capacity: usize,

    /// Delivery retries after the first failed attempt
    pub alert_max_retries: u32,

    /// Base delay for exponential retry backoff
    pub alert_retry_base_delay: Duration,

    /// Maximum alerts sent per minute
    pub alert_rate_per_minute: u32,

    // =========================================================================
    // Observability
    // =========================================================================
    /// Log filter (e.g., "info", "debug")
    pub log_level: String,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if a value fails to parse or the
    /// resulting configuration is inconsistent.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let rules = env::var("RATE_LIMIT_RULES")
            .unwrap_or_else(|_| DEFAULT_RATE_LIMIT_RULES.to_string());

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 8000)?,
            run_mode: Self::parse_env("RUN_MODE", RunMode::Release)?,
            max_request_body_size: Self::parse_env("MAX_REQUEST_BODY_SIZE", 10 * 1024 * 1024)?,
            cors_allowed_origins: Self::parse_list("CORS_ALLOWED_ORIGINS", "*"),

            // Pipeline
            default_context_timeout: Duration::from_secs(Self::parse_env(
                "DEFAULT_CONTEXT_TIMEOUT_SECS",
                60,
            )?),
            rate_limit_rules: parse_rules(&rules)
                .map_err(|e| AppError::ConfigError(format!("Invalid RATE_LIMIT_RULES: {e}")))?,

            // Authentication
            app_key: env::var("APP_KEY").unwrap_or_else(|_| "blog-service".to_string()),
            app_secret: env::var("APP_SECRET").ok().filter(|s| !s.is_empty()),
            token_ttl: Duration::from_secs(Self::parse_env("TOKEN_TTL_SECS", 7200)?),

            // Pagination
            default_page_size: Self::parse_env("DEFAULT_PAGE_SIZE", 10)?,
            max_page_size: Self::parse_env("MAX_PAGE_SIZE", 100)?,

            // Alerting
            alert_recipients: Self::parse_list("ALERT_RECIPIENTS", ""),
            alert_queue_capacity: Self::parse_env("ALERT_QUEUE_CAPACITY", 64)?,
            alert_max_retries: Self::parse_env("ALERT_MAX_RETRIES", 3)?,
            alert_retry_base_delay: Duration::from_millis(Self::parse_env(
                "ALERT_RETRY_BASE_DELAY_MS",
                500,
            )?),
            alert_rate_per_minute: Self::parse_env("ALERT_RATE_PER_MINUTE", 30)?,

            // Observability
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if self.default_context_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "DEFAULT_CONTEXT_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(AppError::ConfigError(format!(
                "DEFAULT_PAGE_SIZE ({}) must be between 1 and MAX_PAGE_SIZE ({})",
                self.default_page_size, self.max_page_size
            )));
        }

        if self.alert_queue_capacity == 0 {
            return Err(AppError::ConfigError(
                "ALERT_QUEUE_CAPACITY must be greater than 0".to_string(),
            ));
        }

        if self.alert_rate_per_minute == 0 {
            return Err(AppError::ConfigError(
                "ALERT_RATE_PER_MINUTE must be greater than 0".to_string(),
            ));
        }

        if self.token_ttl.is_zero() {
            return Err(AppError::ConfigError(
                "TOKEN_TTL_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Alerts are only sent in release mode with at least one recipient.
    pub fn alerting_enabled(&self) -> bool {
        self.run_mode == RunMode::Release && !self.alert_recipients.is_empty()
    }

    /// Check if token authentication is enabled for `/api/v1`.
    pub fn auth_enabled(&self) -> bool {
        self.app_secret.is_some()
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        self.metrics_enabled()
            .then(|| std::net::SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .trim()
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse a comma-separated list, dropping empty entries.
    fn parse_list(name: &str, default: &str) -> Vec<String> {
        env::var(name)
            .unwrap_or_else(|_| default.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            run_mode: RunMode::Release,
            max_request_body_size: 10 * 1024 * 1024, // 10MB
            cors_allowed_origins: vec!["*".to_string()],
            default_context_timeout: Duration::from_secs(60),
            rate_limit_rules: parse_rules(DEFAULT_RATE_LIMIT_RULES).unwrap_or_default(),
            app_key: "blog-service".to_string(),
            app_secret: None,
            token_ttl: Duration::from_secs(7200),
            default_page_size: 10,
            max_page_size: 100,
            alert_recipients: vec![],
            alert_queue_capacity: 64,
            alert_max_retries: 3,
            alert_retry_base_delay: Duration::from_millis(500),
            alert_rate_per_minute: 30,
            log_level: "info".to_string(),
            metrics_port: 9090,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.port, 8000);
        assert_eq!(config.run_mode, RunMode::Release);
        assert_eq!(config.default_context_timeout, Duration::from_secs(60));
        assert_eq!(config.rate_limit_rules.len(), 1);
        assert_eq!(config.rate_limit_rules[0].key(), "/auth");
        assert_eq!(config.rate_limit_rules[0].capacity(), 10);
        assert!(config.app_secret.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_addr_format() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };

        assert_eq!(config.server_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_run_mode_parse() {
        assert_eq!("debug".parse::<RunMode>().unwrap(), RunMode::Debug);
        assert_eq!(" RELEASE ".parse::<RunMode>().unwrap(), RunMode::Release);
        assert!("test".parse::<RunMode>().is_err());
    }

    #[test]
    fn test_alerting_requires_release_mode_and_recipients() {
        let config = Config::default();
        assert!(!config.alerting_enabled());

        let config = Config {
            alert_recipients: vec!["ops@example.com".to_string()],
            ..Config::default()
        };
        assert!(config.alerting_enabled());

        let config = Config {
            run_mode: RunMode::Debug,
            ..config
        };
        assert!(!config.alerting_enabled());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = Config {
            default_context_timeout: Duration::ZERO,
            ..Config::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("DEFAULT_CONTEXT_TIMEOUT_SECS"));
    }

    #[test]
    fn test_validate_page_size_ordering() {
        let config = Config {
            default_page_size: 200,
            max_page_size: 100,
            ..Config::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("DEFAULT_PAGE_SIZE"));
    }

    #[test]
    fn test_validate_alert_queue_capacity() {
        let config = Config {
            alert_queue_capacity: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_addr() {
        assert!(Config::default().metrics_addr().is_some());

        let config = Config {
            metrics_port: 0,
            ..Config::default()
        };
        assert!(config.metrics_addr().is_none());
    }
}
