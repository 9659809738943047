//! # WellPath Common Library
//!
//! Shared code for the WellPath recommendation engine and its tools:
//! - Error type and result alias
//! - Configuration loading (TOML, environment, compiled defaults)
//! - Domain models (catalog, user context, protocol items, assessment signals)
//! - SQLite schema initialization

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod models;

pub use config::EngineThresholds;
pub use error::{Error, Result};
