//! Strongly typed configuration schemas.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use guard_policy::UnrecognizedPolicy;
use guard_tools::ScanDialect;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level mediation configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Tool catalog document (JSON).
    pub catalog_path: Option<PathBuf>,
    /// Principals document (JSON or TOML).
    pub principals_path: Option<PathBuf>,
    /// Constraint evaluation settings.
    pub constraints: ConstraintsConfig,
    /// Reference checking settings.
    pub references: ReferencesConfig,
    /// Repair loop settings.
    pub repair: RepairConfig,
    /// Logging settings.
    pub telemetry: TelemetryConfig,
}

impl GuardConfig {
    /// Resolves relative data paths against `base`, usually the directory
    /// holding the configuration file.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [&mut self.catalog_path, &mut self.principals_path]
            .into_iter()
            .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Replaces the telemetry filter when `filter` is set and non-blank.
    pub fn apply_log_override(&mut self, filter: Option<String>) {
        if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
            self.telemetry.filter = filter;
        }
    }
}

/// Constraint evaluation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintsConfig {
    /// Outcome for constraint expressions that match no known family.
    pub unrecognized: UnrecognizedPolicy,
    /// Treat `maxRecords=<N>` as a ceiling on the `limit` argument instead
    /// of an equality test.
    pub record_ceiling: bool,
}

/// Reference checking settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferencesConfig {
    /// Identifiers accepted without a catalog entry. `None` keeps the
    /// built-in defaults; an empty list disables them.
    pub builtins: Option<Vec<String>>,
    /// Comment syntax of scanned code blocks.
    pub dialect: ScanDialect,
}

/// Repair loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Upper bound on a model-backed repair, in milliseconds.
    pub timeout_ms: u64,
    /// Verify/repair rounds before giving up.
    pub max_attempts: u32,
    /// Values inserted for missing required arguments, by field name.
    pub fills: BTreeMap<String, Value>,
    /// Replacement names for unknown tools.
    pub aliases: BTreeMap<String, String>,
}

impl RepairConfig {
    /// Returns the repair timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_attempts: 3,
            fills: BTreeMap::new(),
            aliases: BTreeMap::new(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `tracing-subscriber` filter directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = GuardConfig::default();
        assert_eq!(config.constraints.unrecognized, UnrecognizedPolicy::FailOpen);
        assert!(!config.constraints.record_ceiling);
        assert_eq!(config.repair.timeout(), Duration::from_secs(5));
        assert_eq!(config.repair.max_attempts, 3);
        assert!(config.references.builtins.is_none());
        assert_eq!(config.references.dialect, ScanDialect::Python);
        assert_eq!(config.telemetry.filter, "info");
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let mut config = GuardConfig {
            catalog_path: Some(PathBuf::from("tools.json")),
            principals_path: Some(PathBuf::from("/etc/toolguard/principals.toml")),
            ..GuardConfig::default()
        };
        config.resolve_paths(Path::new("/srv/guard"));

        assert_eq!(config.catalog_path, Some(PathBuf::from("/srv/guard/tools.json")));
        assert_eq!(
            config.principals_path,
            Some(PathBuf::from("/etc/toolguard/principals.toml"))
        );
    }

    #[test]
    fn log_override_ignores_blank_values() {
        let mut config = GuardConfig::default();
        config.apply_log_override(Some("  ".into()));
        assert_eq!(config.telemetry.filter, "info");
        config.apply_log_override(Some("guard_policy=debug".into()));
        assert_eq!(config.telemetry.filter, "guard_policy=debug");
    }
}
