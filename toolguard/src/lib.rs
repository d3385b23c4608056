//! Tool-call mediation for autonomous agents.
//!
//! Depend on this crate via `cargo add toolguard`. It bundles the internal
//! crates behind feature flags so downstream users can enable only the
//! components they need.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use guard_primitives as primitives;

/// Verification guard, repair advisors, and the mediation pipeline (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use guard_kernel as kernel;

/// Tool catalog, schema validation, and reference checking (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use guard_tools as tools;

/// Capability tokens, constraints, and authorization (enabled by `policy` feature).
#[cfg(feature = "policy")]
pub use guard_policy as policy;

/// Logging setup and decision journaling (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use guard_telemetry as telemetry;

/// Configuration loading (enabled by `config` feature).
#[cfg(feature = "config")]
pub use guard_config as config;
