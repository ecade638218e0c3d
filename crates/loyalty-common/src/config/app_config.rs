//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if one
//! is present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub api: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
    pub accounts: AccountConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// Take client addresses from `X-Forwarded-For`; only safe behind a proxy that sets it
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    /// Token lifetime in seconds
    #[serde(default = "default_token_expiry")]
    pub token_expiry: i64,
}

/// Global request rate limiting
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Account lifecycle settings
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// Reset requests allowed per client per minute
    #[serde(default = "default_reset_requests_per_minute")]
    pub reset_requests_per_minute: u32,
    #[serde(default = "default_reset_token_ttl_minutes")]
    pub reset_token_ttl_minutes: i64,
    /// Lifetime of the activation token issued at registration
    #[serde(default = "default_registration_token_ttl_days")]
    pub registration_token_ttl_days: i64,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            reset_requests_per_minute: default_reset_requests_per_minute(),
            reset_token_ttl_minutes: default_reset_token_ttl_minutes(),
            registration_token_ttl_days: default_registration_token_ttl_days(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "loyalty-server".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_token_expiry() -> i64 {
    86400 // 24 hours
}

fn default_requests_per_second() -> u32 {
    10
}

fn default_burst() -> u32 {
    50
}

fn default_reset_requests_per_minute() -> u32 {
    1
}

fn default_reset_token_ttl_minutes() -> i64 {
    60
}

fn default_registration_token_ttl_days() -> i64 {
    7
}

/// Parse an optional variable, falling back when unset or unparsable
fn var_or<T: FromStr>(key: &str, default: impl FnOnce() -> T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(default)
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let accounts = AccountConfig {
            reset_requests_per_minute: var_or(
                "RESET_REQUESTS_PER_MINUTE",
                default_reset_requests_per_minute,
            ),
            reset_token_ttl_minutes: var_or(
                "RESET_TOKEN_TTL_MINUTES",
                default_reset_token_ttl_minutes,
            ),
            registration_token_ttl_days: var_or(
                "REGISTRATION_TOKEN_TTL_DAYS",
                default_registration_token_ttl_days,
            ),
        };
        if accounts.reset_requests_per_minute == 0 {
            return Err(ConfigError::InvalidValue(
                "RESET_REQUESTS_PER_MINUTE",
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| Environment::parse(&s))
                    .unwrap_or_default(),
            },
            api: ServerConfig {
                host: env::var("API_HOST").unwrap_or_else(|_| default_host()),
                port: env::var("API_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or(ConfigError::MissingVar("API_PORT"))?,
                trust_forwarded_for: var_or("API_TRUST_FORWARDED_FOR", || false),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?,
                max_connections: var_or("DATABASE_MAX_CONNECTIONS", default_max_connections),
                min_connections: var_or("DATABASE_MIN_CONNECTIONS", default_min_connections),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingVar("JWT_SECRET"))?,
                token_expiry: var_or("JWT_TOKEN_EXPIRY", default_token_expiry),
            },
            rate_limit: RateLimitConfig {
                requests_per_second: var_or(
                    "RATE_LIMIT_REQUESTS_PER_SECOND",
                    default_requests_per_second,
                ),
                burst: var_or("RATE_LIMIT_BURST", default_burst),
            },
            cors: CorsConfig {
                allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                    .ok()
                    .map(|s| s.split(',').map(str::trim).map(String::from).collect())
                    .unwrap_or_default(),
            },
            accounts,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("PRODUCTION"), Some(Environment::Production));
        assert_eq!(Environment::parse("qa"), None);
        assert!(Environment::Development.is_development());
        assert!(!Environment::Staging.is_production());
    }

    #[test]
    fn test_server_address() {
        let config = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            trust_forwarded_for: false,
        };
        assert_eq!(config.address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_account_defaults() {
        let accounts = AccountConfig::default();
        assert_eq!(accounts.reset_requests_per_minute, 1);
        assert_eq!(accounts.reset_token_ttl_minutes, 60);
        assert_eq!(accounts.registration_token_ttl_days, 7);
    }

    #[test]
    fn test_var_or_falls_back() {
        assert_eq!(var_or("LOYALTY_TEST_UNSET_VARIABLE", || 42_u32), 42);
    }
}
