//! Detection of references to tools that do not exist.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::registry::Catalog;
use crate::scanner::{ScanDialect, ScanError, call_sites_in};

/// Built-in identifiers that are never reported as unknown tools.
pub const DEFAULT_BUILTINS: &[&str] = &[
    "abs", "all", "any", "append", "bool", "dict", "enumerate", "extend", "filter", "float",
    "format", "get", "int", "isinstance", "items", "join", "keys", "len", "list", "lower",
    "map", "max", "min", "print", "range", "round", "set", "sorted", "split", "str", "strip",
    "sum", "tuple", "upper", "values", "zip",
];

/// A call names a tool absent from the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error, Serialize)]
#[error("Hallucination: Tool '{name}' not found.")]
pub struct UnknownTool {
    /// The name as it appeared in the call.
    pub name: String,
}

/// Checks tool references against a catalog.
#[derive(Debug, Clone)]
pub struct ReferenceChecker {
    builtins: BTreeSet<String>,
    dialect: ScanDialect,
}

impl Default for ReferenceChecker {
    fn default() -> Self {
        Self::with_builtins(DEFAULT_BUILTINS.iter().copied())
    }
}

impl ReferenceChecker {
    /// Creates a checker using [`DEFAULT_BUILTINS`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a checker recognising exactly the supplied built-ins.
    #[must_use]
    pub fn with_builtins<I, S>(builtins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            builtins: builtins.into_iter().map(Into::into).collect(),
            dialect: ScanDialect::default(),
        }
    }

    /// Scans code blocks as `dialect`.
    #[must_use]
    pub fn with_dialect(mut self, dialect: ScanDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Returns the dialect used by [`ReferenceChecker::scan`].
    #[must_use]
    pub fn dialect(&self) -> ScanDialect {
        self.dialect
    }

    /// Returns the recognised built-in identifiers.
    #[must_use]
    pub fn builtins(&self) -> &BTreeSet<String> {
        &self.builtins
    }

    /// Checks a structured call's tool name.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownTool`] when the name is neither registered nor a
    /// built-in.
    pub fn check(&self, name: &str, catalog: &Catalog) -> Result<(), UnknownTool> {
        if catalog.contains(name) || self.builtins.contains(name) {
            Ok(())
        } else {
            Err(UnknownTool { name: name.into() })
        }
    }

    /// Scans a block of call expressions and reports every distinct unknown
    /// callee in order of first appearance.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] when the block cannot be tokenised.
    pub fn scan(&self, code: &str, catalog: &Catalog) -> Result<Vec<UnknownTool>, ScanError> {
        let mut seen = HashSet::new();
        let mut unknown = Vec::new();

        for site in call_sites_in(code, self.dialect)? {
            if !seen.insert(site.callee.clone()) {
                continue;
            }
            if !self.resolves(&site.callee, catalog) {
                debug!(callee = %site.callee, line = site.line, "unknown tool reference");
                unknown.push(UnknownTool { name: site.callee });
            }
        }

        Ok(unknown)
    }

    /// Resolves a dotted callee path from generated code.
    ///
    /// The path resolves when it is a segment-aligned suffix of a registered
    /// name, when one of its own trailing segment runs is a registered name
    /// (`client.crm.get_lead` calls `crm.get_lead`), or when its last segment
    /// is a built-in.
    #[must_use]
    pub fn resolves(&self, path: &str, catalog: &Catalog) -> bool {
        if catalog.has_suffix(path) {
            return true;
        }
        if path
            .match_indices('.')
            .any(|(at, _)| catalog.contains(&path[at + 1..]))
        {
            return true;
        }
        let last = path.rsplit('.').next().unwrap_or(path);
        self.builtins.contains(last)
    }
}
