//! Argument validation against a tool's declared interface.
//!
//! Validation is open-world: arguments the tool does not declare are ignored
//! so forward-compatible calls are not rejected.

use guard_primitives::ArgMap;
use serde::Serialize;
use thiserror::Error;

use crate::definition::{ToolDefinition, TypeTag};

/// Outcome of validating one call against one tool.
pub type ValidationResult = Result<(), SchemaViolation>;

/// Structural violation found by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaViolation {
    /// A required parameter was not supplied.
    #[error("Missing required argument: '{field}'")]
    MissingRequiredArgument {
        /// Name of the missing parameter.
        field: String,
    },
    /// A supplied value has the wrong shape for its declared type.
    #[error("Type mismatch for '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        /// Name of the offending parameter.
        field: String,
        /// Declared type.
        expected: TypeTag,
        /// Runtime category of the supplied value.
        actual: String,
    },
    /// A string value does not fully match the declared pattern.
    #[error("Value for '{field}' does not match pattern {pattern}")]
    PatternMismatch {
        /// Name of the offending parameter.
        field: String,
        /// Declared pattern.
        pattern: String,
    },
}

impl SchemaViolation {
    /// Returns the parameter the violation concerns.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::MissingRequiredArgument { field }
            | Self::TypeMismatch { field, .. }
            | Self::PatternMismatch { field, .. } => field,
        }
    }

    /// Advisory repair hint; never applied automatically.
    #[must_use]
    pub fn fix_suggestion(&self) -> String {
        match self {
            Self::MissingRequiredArgument { field } => format!("Add '{field}' to arguments"),
            Self::TypeMismatch {
                field, expected, ..
            } => format!("Cast '{field}' to {expected}"),
            Self::PatternMismatch { field, pattern } => {
                format!("Format '{field}' to match {pattern}")
            }
        }
    }
}

/// Validates `args` against `tool`, returning the first violation.
///
/// Required parameters are checked first, then each declared parameter's
/// type and pattern in declaration order.
///
/// # Errors
///
/// Returns the first [`SchemaViolation`] found.
pub fn validate(tool: &ToolDefinition, args: &ArgMap) -> ValidationResult {
    match violations(tool, args).next() {
        Some(violation) => Err(violation),
        None => Ok(()),
    }
}

/// Returns every violation, in the order [`validate`] would report them.
#[must_use]
pub fn validate_all(tool: &ToolDefinition, args: &ArgMap) -> Vec<SchemaViolation> {
    violations(tool, args).collect()
}

fn violations<'a>(
    tool: &'a ToolDefinition,
    args: &'a ArgMap,
) -> impl Iterator<Item = SchemaViolation> + 'a {
    let missing = tool
        .required_parameters()
        .filter(|spec| !args.contains_key(spec.name()))
        .map(|spec| SchemaViolation::MissingRequiredArgument {
            field: spec.name().to_owned(),
        });

    let malformed = tool.parameters().iter().filter_map(|spec| {
        let value = args.get(spec.name())?;

        if !spec.type_tag().accepts(value) {
            return Some(SchemaViolation::TypeMismatch {
                field: spec.name().to_owned(),
                expected: spec.type_tag(),
                actual: TypeTag::describe(value).to_owned(),
            });
        }

        let pattern = spec.pattern()?;
        let text = value.as_str()?;
        (!pattern.is_full_match(text)).then(|| SchemaViolation::PatternMismatch {
            field: spec.name().to_owned(),
            pattern: pattern.as_str().to_owned(),
        })
    });

    missing.chain(malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ParameterSpec;
    use proptest::prelude::*;
    use serde_json::{Value, json};

    fn args(value: Value) -> ArgMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("arguments must be an object"),
        }
    }

    fn lead_tool() -> ToolDefinition {
        ToolDefinition::new("salesforce.update_lead")
            .and_then(|t| {
                t.with_parameter(
                    ParameterSpec::required("lead_id", TypeTag::String)?.with_pattern("L-[0-9]+")?,
                )
            })
            .and_then(|t| t.with_parameter(ParameterSpec::required("status", TypeTag::String)?))
            .and_then(|t| t.with_parameter(ParameterSpec::optional("age", TypeTag::Integer)?))
            .and_then(|t| t.with_parameter(ParameterSpec::optional("meta", TypeTag::Unknown)?))
            .unwrap()
    }

    #[test]
    fn integer_parameter_rejects_string() {
        let tool = ToolDefinition::new("a.b")
            .and_then(|t| t.with_parameter(ParameterSpec::required("x", TypeTag::Integer)?))
            .unwrap();

        let err = validate(&tool, &args(json!({ "x": "5" }))).unwrap_err();
        assert_eq!(
            err,
            SchemaViolation::TypeMismatch {
                field: "x".into(),
                expected: TypeTag::Integer,
                actual: "string".into(),
            }
        );
        assert_eq!(err.to_string(), "Type mismatch for 'x': expected integer, got string");
        assert_eq!(err.fix_suggestion(), "Cast 'x' to integer");
    }

    #[test]
    fn missing_required_reported_before_type_errors() {
        let err = validate(&lead_tool(), &args(json!({ "lead_id": 7 }))).unwrap_err();
        assert_eq!(
            err,
            SchemaViolation::MissingRequiredArgument {
                field: "status".into()
            }
        );
        assert_eq!(err.to_string(), "Missing required argument: 'status'");
    }

    #[test]
    fn pattern_must_match_whole_value() {
        let err = validate(
            &lead_tool(),
            &args(json!({ "lead_id": "L-101-extra", "status": "Qualified" })),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaViolation::PatternMismatch { ref field, .. } if field == "lead_id"));

        assert!(validate(&lead_tool(), &args(json!({ "lead_id": "L-101", "status": "Qualified" }))).is_ok());
    }

    #[test]
    fn undeclared_and_unknown_typed_arguments_pass() {
        let call = args(json!({
            "lead_id": "L-7",
            "status": "Open",
            "meta": [1, 2, 3],
            "forward_compatible": { "nested": true }
        }));
        assert!(validate(&lead_tool(), &call).is_ok());
    }

    #[test]
    fn validate_all_collects_every_violation() {
        let call = args(json!({ "lead_id": "nope", "age": 30.5 }));
        let all = validate_all(&lead_tool(), &call);

        let fields: Vec<_> = all.iter().map(SchemaViolation::field).collect();
        assert_eq!(fields, ["status", "lead_id", "age"]);
        assert_eq!(validate(&lead_tool(), &call).unwrap_err(), all[0]);
    }

    proptest! {
        #[test]
        fn missing_required_iff_required_absent(
            required in prop::collection::btree_set("[a-e]", 0..4),
            supplied in prop::collection::btree_set("[a-e]", 0..5),
        ) {
            let mut tool = ToolDefinition::new("prop.tool").unwrap();
            for name in &required {
                tool = tool.with_parameter(ParameterSpec::required(name.clone(), TypeTag::Unknown).unwrap()).unwrap();
            }
            let call: ArgMap = supplied.iter().map(|k| (k.clone(), Value::Bool(true))).collect();

            let result = validate(&tool, &call);
            let any_absent = required.iter().any(|name| !supplied.contains(name));
            let reported_missing = matches!(result, Err(SchemaViolation::MissingRequiredArgument { .. }));
            prop_assert_eq!(reported_missing, any_absent);
        }
    }
}
