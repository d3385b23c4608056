//! Structured tracing helpers.

use anyhow::anyhow;
use guard_config::GuardConfig;
use tracing_subscriber::EnvFilter;

/// Builds a filter from `directives`, falling back to `fallback` and then to
/// `info` when either fails to parse.
#[must_use]
pub fn env_filter(directives: Option<&str>, fallback: &str) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .or_else(|| EnvFilter::try_new(fallback).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Installs a global fmt subscriber filtered by `RUST_LOG`, or by `fallback`
/// when the variable is unset.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_subscriber(fallback: &str) -> anyhow::Result<()> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(directives.as_deref(), fallback))
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

/// Installs the global subscriber with the `[telemetry]` filter of `config`
/// as the fallback for `RUST_LOG`.
///
/// [`guard_config::load_config`] has already applied any `TOOLGUARD_LOG`
/// override to that filter.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_from_config(config: &GuardConfig) -> anyhow::Result<()> {
    init_subscriber(&config.telemetry.filter)
}
