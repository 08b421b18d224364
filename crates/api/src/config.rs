//! Application configuration loaded from environment variables.

use std::fmt;

use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — PostgreSQL connection string (required)
/// - `DB_MAX_CONNECTIONS` — pool size (default: `5`)
/// - `DB_CONNECT_ATTEMPTS` — startup connection attempts (default: `5`)
/// - `PAYMENT_SECRET_KEY` — payment gateway secret key (required)
/// - `PAYMENT_API_BASE` — gateway API base URL (default: `"https://api.stripe.com"`)
/// - `CHECKOUT_RETURN_URL` — where the gateway sends the browser after payment
/// - `CURRENCY` — ISO currency code for charges (default: `"inr"`)
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_attempts: u32,
    pub payment_secret_key: String,
    pub payment_api_base: String,
    pub checkout_return_url: String,
    pub currency: String,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// optional settings.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: required("DATABASE_URL")?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            db_connect_attempts: parse_or(
                &lookup,
                "DB_CONNECT_ATTEMPTS",
                defaults.db_connect_attempts,
            )?,
            payment_secret_key: required("PAYMENT_SECRET_KEY")?,
            payment_api_base: lookup("PAYMENT_API_BASE").unwrap_or(defaults.payment_api_base),
            checkout_return_url: lookup("CHECKOUT_RETURN_URL")
                .unwrap_or(defaults.checkout_return_url),
            currency: lookup("CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or(defaults.currency),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: String::new(),
            db_max_connections: 5,
            db_connect_attempts: 5,
            payment_secret_key: String::new(),
            payment_api_base: "https://api.stripe.com".to_string(),
            checkout_return_url:
                "http://localhost:5173/return?session_id={CHECKOUT_SESSION_ID}".to_string(),
            currency: "inr".to_string(),
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("database_url", &"<redacted>")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_connect_attempts", &self.db_connect_attempts)
            .field("payment_secret_key", &"<redacted>")
            .field("payment_api_base", &self.payment_api_base)
            .field("checkout_return_url", &self.checkout_return_url)
            .field("currency", &self.currency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/food"),
        ("PAYMENT_SECRET_KEY", "sk_test_123"),
    ];

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.db_connect_attempts, 5);
        assert_eq!(config.currency, "inr");
    }

    #[test]
    fn test_from_lookup_applies_defaults() {
        let config = Config::from_lookup(env(&REQUIRED)).unwrap();
        assert_eq!(config.database_url, "postgres://localhost/food");
        assert_eq!(config.payment_secret_key, "sk_test_123");
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.payment_api_base, "https://api.stripe.com");
    }

    #[test]
    fn test_from_lookup_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([("PORT", "8080"), ("CURRENCY", "USD"), ("DB_CONNECT_ATTEMPTS", "2")]);
        let config = Config::from_lookup(env(&pairs)).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.currency, "usd");
        assert_eq!(config.db_connect_attempts, 2);
    }

    #[test]
    fn test_missing_required_values() {
        let err = Config::from_lookup(env(&[("PAYMENT_SECRET_KEY", "sk")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));

        let err = Config::from_lookup(env(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("PAYMENT_SECRET_KEY"));
    }

    #[test]
    fn test_invalid_port() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));
        let err = Config::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::from_lookup(env(&REQUIRED)).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk_test_123"));
        assert!(!rendered.contains("postgres://localhost/food"));
    }
}
