//! Structural verification of proposed calls.

use std::sync::Arc;

use guard_primitives::ProposedCall;
use guard_tools::{
    ReferenceChecker, ScanError, SchemaViolation, ToolRegistry, UnknownTool, validate,
    validate_all,
};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Why a call or code block failed verification.
///
/// Display strings are stable; repair rules match on them.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The call names a tool that is not registered.
    #[error(transparent)]
    UnknownTool(UnknownTool),
    /// The arguments do not satisfy the tool's interface.
    #[error("SchemaViolation: {0}")]
    Schema(SchemaViolation),
    /// A code block could not be scanned.
    #[error("{message}")]
    Syntax {
        /// Rendered scan error.
        message: String,
    },
    /// Call text could not be parsed.
    #[error("MalformedCall: {reason}")]
    Malformed {
        /// Why parsing failed.
        reason: String,
    },
}

impl From<UnknownTool> for Diagnostic {
    fn from(unknown: UnknownTool) -> Self {
        Self::UnknownTool(unknown)
    }
}

impl From<SchemaViolation> for Diagnostic {
    fn from(violation: SchemaViolation) -> Self {
        Self::Schema(violation)
    }
}

impl From<ScanError> for Diagnostic {
    fn from(error: ScanError) -> Self {
        Self::Syntax {
            message: error.to_string(),
        }
    }
}

impl Diagnostic {
    /// Advisory hint for fixing the problem.
    #[must_use]
    pub fn fix_suggestion(&self) -> String {
        match self {
            Self::UnknownTool(unknown) => {
                format!("Replace '{}' with a registered tool", unknown.name)
            }
            Self::Schema(violation) => violation.fix_suggestion(),
            Self::Syntax { .. } => "Balance brackets and close string literals".to_owned(),
            Self::Malformed { .. } => {
                "Emit a JSON object with \"tool\" and \"args\" fields".to_owned()
            }
        }
    }
}

/// Checks that calls reference registered tools and satisfy their schemas.
#[derive(Debug, Clone)]
pub struct VerificationGuard {
    registry: Arc<ToolRegistry>,
    references: ReferenceChecker,
}

impl VerificationGuard {
    /// Creates a guard with the default built-in identifiers.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self::with_references(registry, ReferenceChecker::new())
    }

    /// Creates a guard with a custom reference checker.
    #[must_use]
    pub fn with_references(registry: Arc<ToolRegistry>, references: ReferenceChecker) -> Self {
        Self {
            registry,
            references,
        }
    }

    /// Returns the registry consulted by the guard.
    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Verifies a single call: reference check first, then schema validation.
    ///
    /// Built-in identifiers pass without a schema.
    ///
    /// # Errors
    ///
    /// Returns the first [`Diagnostic`] found.
    pub fn verify(&self, call: &ProposedCall) -> Result<(), Diagnostic> {
        let catalog = self.registry.snapshot();
        self.references.check(call.tool(), &catalog)?;
        if let Some(definition) = catalog.get(call.tool()) {
            validate(definition, call.args())?;
        }
        debug!(tool = call.tool(), "call verified");
        Ok(())
    }

    /// Returns every diagnostic for `call` rather than only the first.
    #[must_use]
    pub fn verify_all(&self, call: &ProposedCall) -> Vec<Diagnostic> {
        let catalog = self.registry.snapshot();
        if let Err(unknown) = self.references.check(call.tool(), &catalog) {
            return vec![unknown.into()];
        }
        catalog
            .get(call.tool())
            .map(|definition| {
                validate_all(definition, call.args())
                    .into_iter()
                    .map(Diagnostic::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Scans a block of generated call expressions.
    ///
    /// Returns one diagnostic per distinct unknown callee, or a single
    /// syntax diagnostic when the block cannot be scanned.
    #[must_use]
    pub fn verify_code(&self, code: &str) -> Vec<Diagnostic> {
        let catalog = self.registry.snapshot();
        match self.references.scan(code, &catalog) {
            Ok(unknown) => unknown.into_iter().map(Diagnostic::from).collect(),
            Err(error) => vec![error.into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guard_tools::{ParameterSpec, ToolDefinition, TypeTag};
    use serde_json::json;

    fn guard() -> VerificationGuard {
        let registry = ToolRegistry::new([
            ToolDefinition::new("a.b")
                .unwrap()
                .with_parameter(ParameterSpec::required("x", TypeTag::Integer).unwrap())
                .unwrap(),
            ToolDefinition::new("salesforce.update_lead")
                .unwrap()
                .with_parameter(ParameterSpec::required("lead_id", TypeTag::String).unwrap())
                .unwrap()
                .with_parameter(ParameterSpec::required("department", TypeTag::String).unwrap())
                .unwrap(),
        ])
        .unwrap();
        VerificationGuard::new(Arc::new(registry))
    }

    #[test]
    fn string_for_integer_is_type_mismatch() {
        let diagnostic = guard()
            .verify(&ProposedCall::new("a.b").with_arg("x", "5"))
            .unwrap_err();
        assert_eq!(
            diagnostic,
            Diagnostic::Schema(SchemaViolation::TypeMismatch {
                field: "x".into(),
                expected: TypeTag::Integer,
                actual: "string".into(),
            })
        );
        assert_eq!(
            diagnostic.to_string(),
            "SchemaViolation: Type mismatch for 'x': expected integer, got string"
        );
    }

    #[test]
    fn unknown_tool_checked_before_schema() {
        let diagnostic = guard()
            .verify(&ProposedCall::new("get_users"))
            .unwrap_err();
        assert_eq!(diagnostic.to_string(), "Hallucination: Tool 'get_users' not found.");
    }

    #[test]
    fn builtins_and_valid_calls_pass() {
        let guard = guard();
        assert!(guard.verify(&ProposedCall::new("print")).is_ok());
        assert!(guard.verify(&ProposedCall::new("a.b").with_arg("x", 5)).is_ok());
    }

    #[test]
    fn verify_all_lists_every_violation() {
        let diagnostics = guard().verify_all(&ProposedCall::new("salesforce.update_lead"));
        let rendered: Vec<_> = diagnostics.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            [
                "SchemaViolation: Missing required argument: 'lead_id'",
                "SchemaViolation: Missing required argument: 'department'",
            ]
        );
    }

    #[test]
    fn verify_code_reports_unknown_callees() {
        let code = "lead = salesforce.update_lead(lead_id='L1', department='Sales')\n\
                    users = crm.get_users()\n\
                    print(len(users))\n\
                    crm.get_users()";
        let diagnostics = guard().verify_code(code);
        assert_eq!(
            diagnostics,
            [Diagnostic::UnknownTool(UnknownTool {
                name: "crm.get_users".into()
            })]
        );
    }

    #[test]
    fn verify_code_reports_syntax_errors() {
        let diagnostics = guard().verify_code("a.b(x=(1)");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].to_string().starts_with("Syntax Error:"));
    }

    #[test]
    fn diagnostics_serialize_with_kind() {
        let value = serde_json::to_value(Diagnostic::from(UnknownTool {
            name: "x".into(),
        }))
        .unwrap();
        assert_eq!(
            value,
            json!({ "kind": "unknown_tool", "detail": { "name": "x" } })
        );
    }
}
