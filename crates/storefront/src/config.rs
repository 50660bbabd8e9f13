//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_DATABASE_URL` / `DATABASE_URL` - `PostgreSQL` connection string
//!   for pending-order records (in-memory records when unset)
//! - `STOREFRONT_CURRENCY` - Store currency (default: PKR)
//! - `STOREFRONT_ALLOWED_ORIGINS` - Comma-separated CORS origins
//! - `WOOCOMMERCE_API_URL` - Commerce REST API base URL
//! - `WOOCOMMERCE_CONSUMER_KEY` / `WOOCOMMERCE_CONSUMER_SECRET` - Basic auth pair
//! - `STRIPE_SECRET_KEY` - Payment processor secret key
//! - `STRIPE_PUBLISHABLE_KEY` - Payment processor publishable key
//! - `STRIPE_API_URL` - Payment processor API base (default: <https://api.stripe.com>)
//! - `CACHE_BACKEND` - `redis`, `memory` or `none` (default: `redis` when
//!   `REDIS_URL` is set, otherwise `none`)
//! - `REDIS_URL` - Redis connection string
//! - `CACHE_TTL_SECONDS` - Default cache entry lifetime (default: 300)
//! - `WEBHOOK_SECRET` - Shared secret for content webhook signatures
//! - `RECONCILE_INTERVAL_SECONDS` - Pending-order sweep interval (default: 60)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use threadline_core::CurrencyCode;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default commerce API base when none is configured.
pub const DEFAULT_COMMERCE_API_URL: &str = "https://demo.woocommerce.com/wp-json/wc/v3";

/// Default payment processor API base.
pub const DEFAULT_STRIPE_API_URL: &str = "https://api.stripe.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// `PostgreSQL` connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// Single store currency
    pub currency: CurrencyCode,
    /// Origins allowed to call the JSON API from a browser
    pub allowed_origins: Vec<String>,
    /// Commerce REST API configuration
    pub commerce: CommerceConfig,
    /// Payment processor configuration
    pub payments: PaymentsConfig,
    /// Read-through cache configuration
    pub cache: CacheConfig,
    /// Content webhook signing secret
    pub webhook_secret: Option<SecretString>,
    /// How often paid-but-unrecorded orders are retried
    pub reconcile_interval: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production")
    pub sentry_environment: Option<String>,
}

/// Commerce REST API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct CommerceConfig {
    /// Base URL, e.g. `https://shop.example.com/wp-json/wc/v3`
    pub api_url: String,
    /// Basic auth user
    pub consumer_key: Option<String>,
    /// Basic auth password
    pub consumer_secret: Option<SecretString>,
}

impl std::fmt::Debug for CommerceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceConfig")
            .field("api_url", &self.api_url)
            .field("consumer_key", &self.consumer_key)
            .field(
                "consumer_secret",
                &self.consumer_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Payment processor configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct PaymentsConfig {
    /// API base URL
    pub api_url: String,
    /// Secret key; card payments are unavailable without it
    pub secret_key: Option<SecretString>,
    /// Publishable key handed to the browser
    pub publishable_key: Option<String>,
}

impl std::fmt::Debug for PaymentsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentsConfig")
            .field("api_url", &self.api_url)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .field("publishable_key", &self.publishable_key)
            .finish()
    }
}

/// Which cache backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Redis,
    Memory,
    None,
}

impl FromStr for CacheBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            "none" | "off" | "" => Ok(Self::None),
            other => Err(format!("expected redis, memory or none (got '{other}')")),
        }
    }
}

/// Read-through cache configuration.
#[derive(Clone)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    /// Redis URL (may contain a password)
    pub redis_url: Option<SecretString>,
    /// Default entry lifetime
    pub ttl: Duration,
}

impl std::fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("backend", &self.backend)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let database_url = get_database_url("STOREFRONT_DATABASE_URL");
        let currency = parse_env("STOREFRONT_CURRENCY", "PKR")?;
        let allowed_origins = parse_list(&get_env_or_default(
            "STOREFRONT_ALLOWED_ORIGINS",
            &base_url,
        ));

        let commerce = CommerceConfig::from_env();
        let payments = PaymentsConfig::from_env();
        let cache = CacheConfig::from_env()?;

        let webhook_secret = match get_optional_env("WEBHOOK_SECRET") {
            Some(value) => {
                validate_secret_strength(&value, "WEBHOOK_SECRET")?;
                Some(SecretString::from(value))
            }
            None => None,
        };
        let reconcile_interval =
            Duration::from_secs(parse_env("RECONCILE_INTERVAL_SECONDS", "60")?);

        Ok(Self {
            host,
            port,
            base_url,
            database_url,
            currency,
            allowed_origins,
            commerce,
            payments,
            cache,
            webhook_secret,
            reconcile_interval,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CommerceConfig {
    fn from_env() -> Self {
        Self {
            api_url: get_env_or_default("WOOCOMMERCE_API_URL", DEFAULT_COMMERCE_API_URL),
            consumer_key: get_optional_env("WOOCOMMERCE_CONSUMER_KEY"),
            consumer_secret: get_optional_env("WOOCOMMERCE_CONSUMER_SECRET")
                .map(SecretString::from),
        }
    }
}

impl PaymentsConfig {
    fn from_env() -> Self {
        Self {
            api_url: get_env_or_default("STRIPE_API_URL", DEFAULT_STRIPE_API_URL),
            secret_key: get_optional_env("STRIPE_SECRET_KEY").map(SecretString::from),
            publishable_key: get_optional_env("STRIPE_PUBLISHABLE_KEY"),
        }
    }
}

impl CacheConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let redis_url = get_optional_env("REDIS_URL");
        let default_backend = if redis_url.is_some() { "redis" } else { "none" };
        let backend: CacheBackendKind = parse_env("CACHE_BACKEND", default_backend)?;

        if backend == CacheBackendKind::Redis && redis_url.is_none() {
            return Err(ConfigError::MissingEnvVar("REDIS_URL".to_string()));
        }

        Ok(Self {
            backend,
            redis_url: redis_url.map(SecretString::from),
            ttl: Duration::from_secs(parse_env("CACHE_TTL_SECONDS", "300")?),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Option<SecretString> {
    get_optional_env(primary_key)
        .or_else(|| get_optional_env("DATABASE_URL"))
        .map(SecretString::from)
}

/// Get an optional, non-empty environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}
