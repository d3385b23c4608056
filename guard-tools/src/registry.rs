//! Immutable tool catalogs and the reloadable registry that serves them.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::info;

use crate::definition::ToolDefinition;

/// Result alias for registry operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors produced while building or loading tool catalogs.
///
/// Every variant aborts catalog construction; a partially usable catalog is
/// never produced.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool or parameter definition failed validation.
    #[error("invalid tool definition: {reason}")]
    InvalidDefinition {
        /// Tool being defined, when known.
        tool: Option<String>,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Parameter validation pattern did not compile.
    #[error("invalid pattern for parameter `{parameter}`: {reason}")]
    InvalidPattern {
        /// Parameter carrying the pattern.
        parameter: String,
        /// Regex compiler message.
        reason: String,
    },

    /// Tool name collided with an existing definition.
    #[error("tool `{name}` is defined more than once")]
    DuplicateTool {
        /// Name of the offending tool.
        name: String,
    },

    /// Catalog file could not be read.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },

    /// Catalog document could not be decoded.
    #[error("catalog decoding error: {source}")]
    Decode {
        /// Source [`serde_json::Error`].
        #[from]
        source: serde_json::Error,
    },
}

/// Immutable snapshot of tool definitions keyed by name.
#[derive(Debug, Default)]
pub struct Catalog {
    tools: HashMap<String, Arc<ToolDefinition>>,
    suffixes: HashSet<String>,
}

impl Catalog {
    /// Builds a catalog from definitions.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if two definitions share a name.
    pub fn new<I>(definitions: I) -> ToolResult<Self>
    where
        I: IntoIterator<Item = ToolDefinition>,
    {
        let mut tools = HashMap::new();
        let mut suffixes = HashSet::new();
        for definition in definitions {
            let name = definition.name().to_owned();
            if tools.contains_key(&name) {
                return Err(ToolError::DuplicateTool { name });
            }
            for (at, _) in name.match_indices('.') {
                suffixes.insert(name[at + 1..].to_owned());
            }
            suffixes.insert(name.clone());
            tools.insert(name, Arc::new(definition));
        }
        Ok(Self { tools, suffixes })
    }

    /// Returns the definition registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<ToolDefinition>> {
        self.tools.get(name)
    }

    /// Returns true when `name` is a registered tool.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Returns true when `path` equals the trailing dot-delimited segments of
    /// some registered name (`get_lead` and `crm.get_lead` both match
    /// `crm.get_lead`).
    #[must_use]
    pub fn has_suffix(&self, path: &str) -> bool {
        self.suffixes.contains(path)
    }

    /// Returns registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Iterates over every definition in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ToolDefinition>> {
        self.tools.values()
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Registry handing out immutable catalog snapshots.
///
/// Readers take an [`Arc`] to the current snapshot and evaluate against it
/// without holding the lock; [`ToolRegistry::reload`] builds the replacement
/// completely before swapping the handle.
#[derive(Default)]
pub struct ToolRegistry {
    current: RwLock<Arc<Catalog>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("ToolRegistry")
            .field("registered", &snapshot.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Creates a registry from definitions.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if two definitions share a name.
    pub fn new<I>(definitions: I) -> ToolResult<Self>
    where
        I: IntoIterator<Item = ToolDefinition>,
    {
        Ok(Self::from_catalog(Catalog::new(definitions)?))
    }

    /// Creates a registry serving an existing catalog.
    #[must_use]
    pub fn from_catalog(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Catalog> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replaces the catalog with one built from `definitions`.
    ///
    /// On error the previous snapshot stays in place.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if two definitions share a name.
    pub fn reload<I>(&self, definitions: I) -> ToolResult<()>
    where
        I: IntoIterator<Item = ToolDefinition>,
    {
        let catalog = Catalog::new(definitions)?;
        self.replace(catalog);
        Ok(())
    }

    /// Swaps in a prebuilt catalog.
    pub fn replace(&self, catalog: Catalog) {
        let tools = catalog.len();
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(catalog);
        info!(tools, "tool catalog reloaded");
    }

    /// Returns the definition registered under `name` in the current snapshot.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        self.snapshot().get(name).cloned()
    }

    /// Returns true when `name` is registered in the current snapshot.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().contains(name)
    }
}
