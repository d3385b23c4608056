//! Declared tool interfaces.

use std::fmt;

use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::registry::{ToolError, ToolResult};

/// Declared parameter type.
///
/// `Unknown` is an explicit variant: parameters whose declared type could
/// not be mapped accept any value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    /// JSON string.
    String,
    /// Whole number.
    Integer,
    /// Any numeric value.
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
    /// Unmapped declaration; every value passes.
    Unknown,
}

impl TypeTag {
    /// Maps a declared type name onto a tag.
    ///
    /// Common synonyms from JSON Schema, Python, and TypeScript catalogs are
    /// accepted case-insensitively; anything else maps to [`TypeTag::Unknown`].
    #[must_use]
    pub fn from_declared(declared: &str) -> Self {
        match declared.trim().to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => Self::String,
            "integer" | "int" | "i32" | "i64" | "long" => Self::Integer,
            "number" | "float" | "double" | "decimal" | "numeric" => Self::Number,
            "boolean" | "bool" => Self::Boolean,
            "array" | "list" | "tuple" => Self::Array,
            "object" | "dict" | "map" | "record" => Self::Object,
            _ => Self::Unknown,
        }
    }

    /// Returns the canonical lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true when `value` has the shape this tag requires.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.as_number().is_some_and(|n| {
                n.is_i64()
                    || n.is_u64()
                    || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
            }),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Unknown => true,
        }
    }

    /// Names the runtime category of a value for diagnostics.
    #[must_use]
    pub fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation pattern compiled to match a whole string value.
#[derive(Clone)]
pub struct ValuePattern {
    source: String,
    regex: Regex,
}

impl ValuePattern {
    /// Compiles `source` anchored at both ends.
    ///
    /// # Errors
    ///
    /// Returns the regex compilation error when `source` is not a valid
    /// pattern.
    pub fn new(source: impl Into<String>) -> Result<Self, regex::Error> {
        let source = source.into();
        let regex = Regex::new(&format!("^(?:{source})$"))?;
        Ok(Self { source, regex })
    }

    /// Returns the pattern as declared.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true when the whole of `value` matches.
    #[must_use]
    pub fn is_full_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl fmt::Debug for ValuePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValuePattern").field(&self.source).finish()
    }
}

impl PartialEq for ValuePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Serialize for ValuePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

/// Declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    name: String,
    #[serde(rename = "type")]
    type_tag: TypeTag,
    required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pattern: Option<ValuePattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
}

impl ParameterSpec {
    /// Declares a required parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidDefinition`] if the name is blank.
    pub fn required(name: impl Into<String>, type_tag: TypeTag) -> ToolResult<Self> {
        Self::build(name.into(), type_tag, true)
    }

    /// Declares an optional parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidDefinition`] if the name is blank.
    pub fn optional(name: impl Into<String>, type_tag: TypeTag) -> ToolResult<Self> {
        Self::build(name.into(), type_tag, false)
    }

    fn build(name: String, type_tag: TypeTag, required: bool) -> ToolResult<Self> {
        if name.trim().is_empty() {
            return Err(ToolError::InvalidDefinition {
                tool: None,
                reason: "parameter name cannot be empty".into(),
            });
        }
        Ok(Self {
            name,
            type_tag,
            required,
            pattern: None,
            default: None,
        })
    }

    /// Attaches a full-match validation pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidPattern`] if the pattern does not compile.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> ToolResult<Self> {
        let pattern = ValuePattern::new(pattern).map_err(|err| ToolError::InvalidPattern {
            parameter: self.name.clone(),
            reason: err.to_string(),
        })?;
        self.pattern = Some(pattern);
        Ok(self)
    }

    /// Attaches a default value.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidDefinition`] for required parameters, which
    /// cannot carry a default.
    pub fn with_default(mut self, default: Value) -> ToolResult<Self> {
        if self.required {
            return Err(ToolError::InvalidDefinition {
                tool: None,
                reason: format!(
                    "parameter `{}` cannot be both required and defaulted",
                    self.name
                ),
            });
        }
        self.default = Some(default);
        Ok(self)
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type.
    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        self.type_tag
    }

    /// Returns true when the parameter must be supplied.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the validation pattern, if declared.
    #[must_use]
    pub fn pattern(&self) -> Option<&ValuePattern> {
        self.pattern.as_ref()
    }

    /// Returns the default value, if declared.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// Declared interface of a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: Vec<ParameterSpec>,
}

impl ToolDefinition {
    /// Creates a definition with no parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidDefinition`] if the name is blank.
    pub fn new(name: impl Into<String>) -> ToolResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ToolError::InvalidDefinition {
                tool: None,
                reason: "tool name cannot be empty".into(),
            });
        }
        Ok(Self {
            name,
            description: None,
            parameters: Vec::new(),
        })
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends a parameter, preserving declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidDefinition`] if a parameter with the same
    /// name is already declared.
    pub fn with_parameter(mut self, parameter: ParameterSpec) -> ToolResult<Self> {
        if self.parameter(parameter.name()).is_some() {
            return Err(ToolError::InvalidDefinition {
                tool: Some(self.name),
                reason: format!("parameter `{}` declared twice", parameter.name()),
            });
        }
        self.parameters.push(parameter);
        Ok(self)
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the parameters in declaration order.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Looks up a parameter by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Iterates over required parameters.
    pub fn required_parameters(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.parameters.iter().filter(|p| p.required)
    }
}
