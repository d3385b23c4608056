//! Configuration and principals loaders.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use guard_policy::PrincipalRecord;
use serde::Deserialize;
use tracing::debug;

use crate::schema::GuardConfig;

/// Environment variable overriding the telemetry filter.
pub const LOG_ENV: &str = "TOOLGUARD_LOG";

/// Parses a TOML configuration document.
///
/// # Errors
///
/// Returns an error when the document is not valid TOML or does not match
/// the configuration schema.
pub fn parse_config(document: &str) -> Result<GuardConfig> {
    toml::from_str(document).context("invalid guard configuration")
}

/// Loads configuration from a TOML file.
///
/// Relative data paths are resolved against the file's directory, and
/// [`LOG_ENV`] overrides the telemetry filter when set.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed.
pub fn load_config(path: impl AsRef<Path>) -> Result<GuardConfig> {
    let path = path.as_ref();
    let document = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let mut config =
        parse_config(&document).with_context(|| format!("failed to parse config {}", path.display()))?;

    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }
    config.apply_log_override(std::env::var(LOG_ENV).ok());
    debug!(path = %path.display(), "guard configuration loaded");
    Ok(config)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PrincipalsDocument {
    List(Vec<PrincipalRecord>),
    Wrapped { principals: Vec<PrincipalRecord> },
}

impl PrincipalsDocument {
    fn into_records(self) -> Vec<PrincipalRecord> {
        match self {
            Self::List(records) | Self::Wrapped { principals: records } => records,
        }
    }
}

/// Parses a principals document.
///
/// JSON accepts a bare list or a `{ "principals": [...] }` object; TOML uses
/// `[[principals]]` tables.
///
/// # Errors
///
/// Returns an error when the document does not parse or a token inside it
/// fails validation.
pub fn parse_principals(document: &str, toml_format: bool) -> Result<Vec<PrincipalRecord>> {
    let parsed: PrincipalsDocument = if toml_format {
        toml::from_str(document).context("invalid principals TOML")?
    } else {
        serde_json::from_str(document).context("invalid principals JSON")?
    };
    Ok(parsed.into_records())
}

/// Loads principals from a file, choosing the format by extension.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed.
pub fn load_principals(path: impl AsRef<Path>) -> Result<Vec<PrincipalRecord>> {
    let path = path.as_ref();
    let document = fs::read_to_string(path)
        .with_context(|| format!("failed to read principals {}", path.display()))?;
    let toml_format = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let records = parse_principals(&document, toml_format)
        .with_context(|| format!("failed to parse principals {}", path.display()))?;
    debug!(path = %path.display(), principals = records.len(), "principals loaded");
    Ok(records)
}
