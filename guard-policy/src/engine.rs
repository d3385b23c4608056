//! Authorization kernel evaluating calls against capability tokens.

use guard_primitives::{ArgMap, CallerContext, CapabilityToken, PrincipalId, ProposedCall};
use thiserror::Error;
use tracing::debug;

use crate::constraint::{ConstraintEngine, UnrecognizedPolicy};
use crate::decision::Decision;
use crate::store::TokenSource;

/// Errors surfaced while loading policy data.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A principal appeared more than once in a principals document.
    #[error("duplicate principal: {id}")]
    DuplicatePrincipal {
        /// Offending principal identifier.
        id: String,
    },
    /// A token or identifier failed validation.
    #[error(transparent)]
    Primitive(#[from] guard_primitives::Error),
}

/// Result alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Stateless evaluator turning a call and a token set into a [`Decision`].
///
/// Tokens are tried in the order supplied. The first matching token whose
/// constraints all hold allows the call; adding tokens can therefore only
/// turn a denial into an allow, never the reverse.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationKernel {
    constraints: ConstraintEngine,
}

impl AuthorizationKernel {
    /// Creates a kernel evaluating constraints with `constraints`.
    #[must_use]
    pub fn new(constraints: ConstraintEngine) -> Self {
        Self { constraints }
    }

    /// Creates a kernel with the given treatment of unrecognized constraints.
    #[must_use]
    pub fn with_unrecognized(policy: UnrecognizedPolicy) -> Self {
        Self::new(ConstraintEngine::new(policy))
    }

    /// Returns the constraint engine in use.
    #[must_use]
    pub fn constraints(&self) -> &ConstraintEngine {
        &self.constraints
    }

    /// Decides whether `tool` may be called with `args` under `tokens`.
    #[must_use]
    pub fn enforce(
        &self,
        tool: &str,
        args: &ArgMap,
        tokens: &[CapabilityToken],
        context: &CallerContext,
    ) -> Decision {
        let mut last_failure: Option<&str> = None;
        let mut matched = false;

        for token in tokens.iter().filter(|token| token.matches(tool)) {
            matched = true;
            let failing = token
                .constraints()
                .iter()
                .find(|expression| !self.constraints.evaluate(expression, args, context));
            match failing {
                None => {
                    debug!(tool, pattern = %token.pattern(), "capability token satisfied");
                    return Decision::allow();
                }
                Some(expression) => last_failure = Some(expression.as_str()),
            }
        }

        if !matched {
            return Decision::no_capability_token();
        }
        Decision::constraint_violation(tool, last_failure.unwrap_or_default())
    }

    /// Resolves `principal`'s tokens from `source` and enforces `call`.
    #[must_use]
    pub fn enforce_for(
        &self,
        source: &dyn TokenSource,
        principal: &PrincipalId,
        call: &ProposedCall,
        context: &CallerContext,
    ) -> Decision {
        let tokens = source.tokens_for(principal);
        self.enforce(call.tool(), call.args(), &tokens, context)
    }
}
