//! Observability utilities for the mediation kernel.

#![warn(missing_docs, clippy::pedantic)]

pub mod replay;
pub mod tracing_support;

pub use replay::{AuditEntry, DecisionJournal, ReplayDivergence};
pub use tracing_support::{env_filter, init_from_config, init_subscriber};
