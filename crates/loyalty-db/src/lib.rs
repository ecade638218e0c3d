//! # loyalty-db
//!
//! Persistence for the loyalty ledger.
//!
//! ## Overview
//!
//! This crate provides two implementations of every repository trait
//! defined in `loyalty-core`:
//!
//! - PostgreSQL repositories (SQLx), with schema migrations
//! - [`MemoryStore`], a single-lock in-memory store used by tests and
//!   local development
//!
//! ## Usage
//!
//! ```rust,ignore
//! use loyalty_db::pool::{create_pool, run_migrations, DatabaseConfig};
//! use loyalty_db::repositories::PgLedgerRepository;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool(&DatabaseConfig::from_env()).await?;
//!     run_migrations(&pool).await?;
//!     let ledger = PgLedgerRepository::new(pool);
//!     Ok(())
//! }
//! ```

pub mod mappers;
pub mod memory;
pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used types
pub use memory::MemoryStore;
pub use pool::{create_pool, create_pool_from_env, run_migrations, DatabaseConfig, PgPool};
pub use repositories::{
    PgEventRepository, PgLedgerRepository, PgPromotionRepository, PgUserRepository,
};
