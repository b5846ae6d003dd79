//! PromoReel Common Utilities
//!
//! Shared infrastructure for all PromoReel crates:
//! - Error types and result aliases
//! - Tracing/logging initialization
//! - Application configuration loading (log level, encoder binaries)

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
