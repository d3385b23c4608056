//! End-to-end mediation of proposed calls.

use std::sync::Arc;

use anyhow::Context;
use guard_config::{GuardConfig, load_principals};
use guard_policy::{
    AuthorizationKernel, ConstraintEngine, Decision, DecisionObserver, PrincipalRecord,
    StaticTokenStore, TokenSource, suggest,
};
use guard_primitives::{CallerContext, CapabilityToken, PrincipalId, ProposedCall};
use guard_tools::{ReferenceChecker, ToolDefinition, ToolRegistry, catalog::load_catalog};
use tracing::{debug, info, warn};

use crate::call_text::parse_call;
use crate::error::GuardResult;
use crate::guard::{Diagnostic, VerificationGuard};
use crate::repair::RepairAdvisor;

/// Outcome of mediating one call.
#[derive(Debug, Clone, PartialEq)]
pub struct Mediation {
    verification: Result<(), Diagnostic>,
    decision: Option<Decision>,
    suggestion: Option<CapabilityToken>,
}

impl Mediation {
    /// Returns true when the call is well-formed and authorized.
    #[must_use]
    pub fn is_permitted(&self) -> bool {
        self.verification.is_ok() && self.decision.as_ref().is_some_and(Decision::is_allowed)
    }

    /// Returns the structural verification result.
    #[must_use]
    pub fn verification(&self) -> &Result<(), Diagnostic> {
        &self.verification
    }

    /// Returns the verification diagnostic, if any.
    #[must_use]
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        self.verification.as_ref().err()
    }

    /// Returns the authorization decision; absent when verification failed.
    #[must_use]
    pub fn decision(&self) -> Option<&Decision> {
        self.decision.as_ref()
    }

    /// Returns the advisory grant proposed for a denied call.
    #[must_use]
    pub fn suggestion(&self) -> Option<&CapabilityToken> {
        self.suggestion.as_ref()
    }
}

/// Result of a verify/repair loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOutcome {
    /// Final call text.
    pub text: String,
    /// Repairs requested from the advisor.
    pub attempts: u32,
    /// Diagnostic for `text`; `None` when it verified.
    pub diagnostic: Option<Diagnostic>,
}

impl RepairOutcome {
    /// Returns true when the final text verified.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.diagnostic.is_none()
    }
}

/// Verification guard and authorization kernel wired to shared state.
pub struct Mediator {
    tokens: Arc<dyn TokenSource>,
    guard: VerificationGuard,
    kernel: AuthorizationKernel,
    observer: Option<Arc<dyn DecisionObserver>>,
}

impl std::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("guard", &self.guard)
            .field("kernel", &self.kernel)
            .field("observed", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl Mediator {
    /// Creates a mediator with default reference checking and fail-open
    /// constraint evaluation.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            tokens,
            guard: VerificationGuard::new(registry),
            kernel: AuthorizationKernel::default(),
            observer: None,
        }
    }

    /// Builds a mediator over in-memory tool definitions and principal records.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GuardError::Tools`] for duplicate tools and
    /// [`crate::GuardError::Policy`] for duplicate principals.
    pub fn from_parts<D, P>(definitions: D, principals: P) -> GuardResult<Self>
    where
        D: IntoIterator<Item = ToolDefinition>,
        P: IntoIterator<Item = PrincipalRecord>,
    {
        let registry = ToolRegistry::new(definitions)?;
        let store = StaticTokenStore::from_records(principals)?;
        Ok(Self::new(Arc::new(registry), Arc::new(store)))
    }

    /// Loads catalog and principals named by `config` and wires a mediator.
    ///
    /// Missing paths yield an empty catalog or token store.
    ///
    /// # Errors
    ///
    /// Returns an error when a configured file cannot be read or fails
    /// validation.
    pub fn from_config(config: &GuardConfig) -> anyhow::Result<Self> {
        let registry = match &config.catalog_path {
            Some(path) => {
                let definitions = load_catalog(path)
                    .with_context(|| format!("failed to load catalog {}", path.display()))?;
                ToolRegistry::new(definitions).context("invalid tool catalog")?
            }
            None => ToolRegistry::default(),
        };
        let store = match &config.principals_path {
            Some(path) => StaticTokenStore::from_records(load_principals(path)?)
                .context("invalid principals document")?,
            None => StaticTokenStore::default(),
        };
        let references = match &config.references.builtins {
            Some(builtins) => ReferenceChecker::with_builtins(builtins.iter().cloned()),
            None => ReferenceChecker::new(),
        }
        .with_dialect(config.references.dialect);

        info!(
            tools = registry.snapshot().len(),
            principals = store.principals().len(),
            "mediator configured"
        );
        Ok(Self::new(Arc::new(registry), Arc::new(store))
            .with_references(references)
            .with_kernel(AuthorizationKernel::new(
                ConstraintEngine::new(config.constraints.unrecognized)
                    .with_record_ceiling(config.constraints.record_ceiling),
            )))
    }

    /// Replaces the authorization kernel.
    #[must_use]
    pub fn with_kernel(mut self, kernel: AuthorizationKernel) -> Self {
        self.kernel = kernel;
        self
    }

    /// Replaces the reference checker.
    #[must_use]
    pub fn with_references(mut self, references: ReferenceChecker) -> Self {
        self.guard = VerificationGuard::with_references(Arc::clone(self.guard.registry()), references);
        self
    }

    /// Notifies `observer` of every authorization decision.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn DecisionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Returns the registry shared with the guard.
    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        self.guard.registry()
    }

    /// Returns the token source consulted by the kernel.
    #[must_use]
    pub fn tokens(&self) -> &Arc<dyn TokenSource> {
        &self.tokens
    }

    /// Returns the verification guard.
    #[must_use]
    pub fn guard(&self) -> &VerificationGuard {
        &self.guard
    }

    /// Verifies `call`, then authorizes it for `principal`.
    ///
    /// Denied calls carry an advisory grant that would have allowed them.
    #[must_use]
    pub fn mediate(
        &self,
        principal: &PrincipalId,
        call: &ProposedCall,
        context: &CallerContext,
    ) -> Mediation {
        if let Err(diagnostic) = self.guard.verify(call) {
            warn!(principal = %principal, tool = call.tool(), %diagnostic, "call rejected");
            return Mediation {
                verification: Err(diagnostic),
                decision: None,
                suggestion: None,
            };
        }

        let decision = self
            .kernel
            .enforce_for(self.tokens.as_ref(), principal, call, context);
        if let Some(observer) = &self.observer {
            observer.on_decision(principal, call, context, &decision);
        }

        let suggestion =
            (!decision.is_allowed()).then(|| suggest(call.tool(), call.args(), context));

        Mediation {
            verification: Ok(()),
            decision: Some(decision),
            suggestion,
        }
    }

    /// Parses and verifies `text`, asking `advisor` for fixes until it
    /// verifies, the advisor stops changing it, or `max_attempts` repairs
    /// have been requested.
    pub async fn repair_until_valid(
        &self,
        text: &str,
        advisor: &dyn RepairAdvisor,
        max_attempts: u32,
    ) -> RepairOutcome {
        let mut current = text.to_owned();
        let mut attempts = 0;

        loop {
            let diagnostic = match parse_call(&current) {
                Ok(call) => self.guard.verify(&call).err(),
                Err(error) => Some(Diagnostic::Malformed {
                    reason: error.to_string(),
                }),
            };
            let Some(diagnostic) = diagnostic else {
                debug!(attempts, "call verified after repair");
                return RepairOutcome {
                    text: current,
                    attempts,
                    diagnostic: None,
                };
            };
            if attempts >= max_attempts {
                return RepairOutcome {
                    text: current,
                    attempts,
                    diagnostic: Some(diagnostic),
                };
            }

            attempts += 1;
            let repaired = advisor.repair(&current, &diagnostic.to_string()).await;
            if repaired == current {
                debug!(attempts, %diagnostic, "advisor made no progress");
                return RepairOutcome {
                    text: current,
                    attempts,
                    diagnostic: Some(diagnostic),
                };
            }
            current = repaired;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repair::RuleBasedRepair;
    use guard_policy::ReasonCode;
    use guard_tools::{ParameterSpec, TypeTag};
    use std::io::Write;

    fn mediator() -> Mediator {
        let registry = ToolRegistry::new([
            ToolDefinition::new("sales.update_lead")
                .unwrap()
                .with_parameter(ParameterSpec::required("lead_id", TypeTag::String).unwrap())
                .unwrap()
                .with_parameter(ParameterSpec::required("department", TypeTag::String).unwrap())
                .unwrap(),
            ToolDefinition::new("crm.list_users").unwrap(),
        ])
        .unwrap();
        let store = StaticTokenStore::from_records([PrincipalRecord {
            id: PrincipalId::new("alice_sales").unwrap(),
            tokens: vec![
                CapabilityToken::new("sales.*", ["write"], ["department=Sales"], "Sales CRM")
                    .unwrap(),
            ],
        }])
        .unwrap();
        Mediator::new(Arc::new(registry), Arc::new(store))
    }

    fn alice() -> PrincipalId {
        PrincipalId::new("alice_sales").unwrap()
    }

    #[test]
    fn permitted_call_has_no_suggestion() {
        let call = ProposedCall::new("sales.update_lead")
            .with_arg("lead_id", "L1")
            .with_arg("department", "Sales");
        let outcome = mediator().mediate(&alice(), &call, &CallerContext::for_user("alice_sales"));
        assert!(outcome.is_permitted());
        assert!(outcome.suggestion().is_none());
    }

    #[test]
    fn denied_call_carries_suggestion() {
        let call = ProposedCall::new("sales.update_lead")
            .with_arg("lead_id", "L1")
            .with_arg("department", "Engineering");
        let outcome = mediator().mediate(&alice(), &call, &CallerContext::for_user("alice_sales"));

        let decision = outcome.decision().unwrap();
        assert_eq!(decision.reason(), ReasonCode::ConstraintViolation);
        assert_eq!(decision.failed_constraint(), Some("department=Sales"));
        assert_eq!(
            outcome.suggestion().unwrap().constraints(),
            ["department=Engineering"]
        );
    }

    #[test]
    fn structural_failure_skips_authorization() {
        let outcome = mediator().mediate(
            &alice(),
            &ProposedCall::new("sales.update_lead").with_arg("lead_id", "L1"),
            &CallerContext::new(),
        );
        assert!(outcome.decision().is_none());
        assert_eq!(
            outcome.diagnostic().unwrap().to_string(),
            "SchemaViolation: Missing required argument: 'department'"
        );
    }

    #[tokio::test]
    async fn repair_loop_fixes_call() {
        let advisor = RuleBasedRepair::new()
            .with_fill("department", "Sales")
            .with_alias("update_leads", "update_lead");
        let outcome = mediator()
            .repair_until_valid(
                r#"{"tool": "sales.update_leads", "args": {"lead_id": "L1"}}"#,
                &advisor,
                3,
            )
            .await;

        assert!(outcome.is_valid());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(
            parse_call(&outcome.text).unwrap().args().get("department"),
            Some(&serde_json::json!("Sales"))
        );
    }

    #[tokio::test]
    async fn repair_loop_stops_without_progress() {
        let outcome = mediator()
            .repair_until_valid(r#"{"tool": "hr.get_salary"}"#, &RuleBasedRepair::new(), 5)
            .await;
        assert_eq!(outcome.attempts, 1);
        assert_eq!(
            outcome.diagnostic.map(|d| d.to_string()).as_deref(),
            Some("Hallucination: Tool 'hr.get_salary' not found.")
        );
    }

    #[tokio::test]
    async fn zero_attempts_only_verifies() {
        let outcome = mediator()
            .repair_until_valid("not a call", &RuleBasedRepair::new(), 0)
            .await;
        assert_eq!(outcome.attempts, 0);
        assert!(matches!(outcome.diagnostic, Some(Diagnostic::Malformed { .. })));
    }

    #[test]
    fn from_config_loads_files() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = dir.path().join("tools.json");
        std::fs::write(
            &catalog,
            r#"[{ "name": "gdrive.read_file", "parameters": { "required": ["file_id"],
                 "properties": { "file_id": { "type": "str" } } } }]"#,
        )
        .unwrap();
        let principals = dir.path().join("principals.json");
        let mut file = std::fs::File::create(&principals).unwrap();
        write!(
            file,
            r#"[{{ "id": "bob_eng", "tokens": [{{ "pattern": "gdrive.*", "operations": ["read"] }}] }}]"#
        )
        .unwrap();

        let config = GuardConfig {
            catalog_path: Some(catalog),
            principals_path: Some(principals),
            ..GuardConfig::default()
        };
        let mediator = Mediator::from_config(&config).unwrap();
        let outcome = mediator.mediate(
            &PrincipalId::new("bob_eng").unwrap(),
            &ProposedCall::new("gdrive.read_file").with_arg("file_id", "f1"),
            &CallerContext::for_user("bob_eng"),
        );
        assert!(outcome.is_permitted());
    }

    #[test]
    fn from_parts_rejects_duplicate_principals() {
        let record = PrincipalRecord {
            id: alice(),
            tokens: Vec::new(),
        };
        let err = Mediator::from_parts(Vec::<ToolDefinition>::new(), [record.clone(), record]).unwrap_err();
        assert!(matches!(err, crate::GuardError::Policy(_)));
    }

    #[test]
    fn from_config_reports_missing_catalog() {
        let config = GuardConfig {
            catalog_path: Some("/nonexistent/tools.json".into()),
            ..GuardConfig::default()
        };
        let err = Mediator::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("failed to load catalog"));
    }
}
