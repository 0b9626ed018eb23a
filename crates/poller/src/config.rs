//! Poller configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `POLLER_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `STOREFRONT_BASE_URL` - Upstream storefront origin (default: <https://shop.amul.com>)
//! - `STOREFRONT_STORE_ID` - Store identifier used in request signatures
//! - `STOREFRONT_CATEGORY` - Category slug to poll (default: protein)
//! - `POLL_INTERVAL_SECS` - Seconds between poll cycles (default: 60)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sampling (default: 1.0)

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://shop.amul.com";
const DEFAULT_STORE_ID: &str = "62fa94df8c13af2e242eba16";
const DEFAULT_CATEGORY: &str = "protein";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Poller application configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Upstream storefront configuration
    pub storefront: StorefrontConfig,
    /// Time between poll cycles
    pub poll_interval: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Upstream storefront endpoints and signing inputs.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Storefront origin (scheme + host)
    pub base_url: Url,
    /// Store identifier mixed into every request signature
    pub store_id: String,
    /// Category slug whose inventory is polled
    pub category: String,
}

impl StorefrontConfig {
    /// The origin without a trailing slash, ready for endpoint paths.
    #[must_use]
    pub fn endpoint_base(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_owned()
    }

    fn from_env() -> Result<Self, ConfigError> {
        let raw_base = get_env_or_default("STOREFRONT_BASE_URL", DEFAULT_BASE_URL);
        let base_url = Url::parse(&raw_base).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;

        Ok(Self {
            base_url,
            store_id: get_env_or_default("STOREFRONT_STORE_ID", DEFAULT_STORE_ID),
            category: get_env_or_default("STOREFRONT_CATEGORY", DEFAULT_CATEGORY),
        })
    }
}

impl PollerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("POLLER_DATABASE_URL")?;
        let storefront = StorefrontConfig::from_env()?;

        let poll_interval_secs =
            get_env_or_default("POLL_INTERVAL_SECS", &DEFAULT_POLL_INTERVAL_SECS.to_string())
                .parse::<u64>()
                .map_err(|e| {
                    ConfigError::InvalidEnvVar("POLL_INTERVAL_SECS".to_string(), e.to_string())
                })?;
        if poll_interval_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "POLL_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            storefront,
            poll_interval: Duration::from_secs(poll_interval_secs),
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    // Try primary key first (e.g., POLLER_DATABASE_URL)
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    // Fallback to generic DATABASE_URL (set by Fly.io postgres attach)
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
