//! Configuration management for the mediation kernel.
//!
//! [`schema`] holds the strongly typed configuration; [`loader`] reads it and
//! the principals document it points at from disk.

#![warn(missing_docs, clippy::pedantic)]

pub mod loader;
pub mod schema;

pub use loader::{LOG_ENV, load_config, load_principals, parse_config, parse_principals};
pub use schema::{
    ConstraintsConfig, GuardConfig, ReferencesConfig, RepairConfig, TelemetryConfig,
};
