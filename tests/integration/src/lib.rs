//! Integration test utilities for the loyalty server
//!
//! Spawns the full Axum application on a local port and drives it over
//! HTTP with `reqwest`.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
