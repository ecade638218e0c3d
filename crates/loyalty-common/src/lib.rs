//! # loyalty-common
//!
//! Shared utilities including configuration, error handling, caller tokens,
//! rate limiting and telemetry.

pub mod auth;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{Claims, JwtService};
pub use config::{
    AccountConfig, AppConfig, AppSettings, ConfigError, CorsConfig, DatabaseConfig, Environment,
    JwtConfig, RateLimitConfig, ServerConfig,
};
pub use error::{AppError, AppResult, ErrorResponse};
pub use rate_limit::{GovernorRateLimiter, KeyedRateLimiter};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
