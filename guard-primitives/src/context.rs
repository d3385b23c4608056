//! Proposed calls and the caller context supplied with each request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Dynamically typed call arguments keyed by parameter name.
pub type ArgMap = Map<String, Value>;

/// Context key holding the identity used by ownership constraints.
pub const USER_ID_KEY: &str = "user_id";

/// A tool invocation proposed by an agent, prior to any checks.
///
/// Accepts `name` for `tool` and `parameters`/`arguments` for `args` when
/// deserialized, matching the shapes agents commonly emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedCall {
    #[serde(alias = "name")]
    tool: String,
    #[serde(default, alias = "parameters", alias = "arguments")]
    args: ArgMap,
}

impl ProposedCall {
    /// Creates a call with no arguments.
    #[must_use]
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            args: ArgMap::new(),
        }
    }

    /// Creates a call with the supplied arguments.
    #[must_use]
    pub fn with_args(tool: impl Into<String>, args: ArgMap) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }

    /// Adds an argument and returns the updated call.
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Returns the tool name, which may not exist in any registry.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Returns the arguments.
    #[must_use]
    pub fn args(&self) -> &ArgMap {
        &self.args
    }
}

/// Free-form key/value context consulted by constraint evaluation.
///
/// Supplied per request by the caller; the kernel never stores it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerContext {
    attributes: Map<String, Value>,
}

impl CallerContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context carrying only a `user_id` attribute.
    #[must_use]
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self::new().with_attribute(USER_ID_KEY, Value::String(user_id.into()))
    }

    /// Inserts an attribute into the context.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    /// Adds an attribute and returns the updated context.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the attribute stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Returns the `user_id` attribute, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<&Value> {
        self.get(USER_ID_KEY)
    }

    /// Returns every attribute.
    #[must_use]
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }
}

impl From<Map<String, Value>> for CallerContext {
    fn from(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }
}
