//! Catalog ingestion from JSON tool records.
//!
//! Accepts the record shape emitted by common tool scrapers and schema
//! generators:
//!
//! ```json
//! { "name": "a.b",
//!   "parameters": { "required": ["x"],
//!                   "properties": { "x": { "type": "int", "pattern": "[0-9]+" } } } }
//! ```
//!
//! `schema`, `input_schema`, and `inputSchema` are accepted in place of
//! `parameters`. Parameters are declared in property order, followed by any
//! required names that have no property entry (typed `unknown`).

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::definition::{ParameterSpec, ToolDefinition, TypeTag};
use crate::registry::{ToolError, ToolResult};

/// Raw tool record as found in a catalog document.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolRecord {
    /// Unique tool name.
    pub name: String,
    /// Optional human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Parameter schema.
    #[serde(
        default,
        alias = "schema",
        alias = "input_schema",
        alias = "inputSchema"
    )]
    pub parameters: SchemaRecord,
}

/// Parameter schema in JSON-Schema-like form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaRecord {
    /// Names of required parameters.
    #[serde(default)]
    pub required: Vec<String>,
    /// Per-parameter declarations keyed by name.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    List(Vec<ToolRecord>),
    Wrapped { tools: Vec<ToolRecord> },
}

impl TryFrom<ToolRecord> for ToolDefinition {
    type Error = ToolError;

    fn try_from(record: ToolRecord) -> ToolResult<Self> {
        let ToolRecord {
            name,
            description,
            parameters,
        } = record;

        let mut definition = ToolDefinition::new(name.clone())?;
        if let Some(description) = description {
            definition = definition.with_description(description);
        }

        for (field, declaration) in &parameters.properties {
            let required = parameters.required.iter().any(|r| r == field);
            let spec = parameter_from_property(field, declaration, required)
                .map_err(|err| attribute_to_tool(err, &name))?;
            definition = definition.with_parameter(spec)?;
        }

        for field in &parameters.required {
            if definition.parameter(field).is_none() {
                definition =
                    definition.with_parameter(ParameterSpec::required(field.clone(), TypeTag::Unknown)?)?;
            }
        }

        Ok(definition)
    }
}

fn parameter_from_property(field: &str, declaration: &Value, required: bool) -> ToolResult<ParameterSpec> {
    let Value::Object(declaration) = declaration else {
        return Err(ToolError::InvalidDefinition {
            tool: None,
            reason: format!("property `{field}` must be an object"),
        });
    };

    let type_tag = declaration
        .get("type")
        .and_then(Value::as_str)
        .map_or(TypeTag::Unknown, TypeTag::from_declared);

    let mut spec = if required {
        ParameterSpec::required(field, type_tag)?
    } else {
        ParameterSpec::optional(field, type_tag)?
    };

    match declaration.get("pattern") {
        None | Some(Value::Null) => {}
        Some(Value::String(pattern)) => spec = spec.with_pattern(pattern.clone())?,
        Some(_) => {
            return Err(ToolError::InvalidDefinition {
                tool: None,
                reason: format!("pattern for `{field}` must be a string"),
            });
        }
    }

    if let Some(default) = declaration.get("default") {
        spec = spec.with_default(default.clone())?;
    }

    Ok(spec)
}

fn attribute_to_tool(err: ToolError, tool: &str) -> ToolError {
    match err {
        ToolError::InvalidDefinition { tool: None, reason } => ToolError::InvalidDefinition {
            tool: Some(tool.to_owned()),
            reason: format!("{tool}: {reason}"),
        },
        ToolError::InvalidPattern { parameter, reason } => ToolError::InvalidPattern {
            parameter: format!("{tool}.{parameter}"),
            reason,
        },
        other => other,
    }
}

/// Parses a catalog document: either a JSON array of tool records or an
/// object with a `tools` array.
///
/// # Errors
///
/// Returns [`ToolError::Decode`] for malformed JSON and the first definition
/// error otherwise; no partial catalog is returned.
pub fn parse_catalog(document: &str) -> ToolResult<Vec<ToolDefinition>> {
    let records = match serde_json::from_str::<CatalogDocument>(document)? {
        CatalogDocument::List(records) | CatalogDocument::Wrapped { tools: records } => records,
    };
    records.into_iter().map(ToolDefinition::try_from).collect()
}

/// Reads and parses a catalog file.
///
/// # Errors
///
/// Returns [`ToolError::Io`] when the file cannot be read, otherwise the
/// errors of [`parse_catalog`].
pub fn load_catalog(path: impl AsRef<Path>) -> ToolResult<Vec<ToolDefinition>> {
    let path = path.as_ref();
    let document = fs::read_to_string(path)?;
    let definitions = parse_catalog(&document)?;
    debug!(path = %path.display(), tools = definitions.len(), "tool catalog parsed");
    Ok(definitions)
}
