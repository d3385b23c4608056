//! Hooks notified whenever the kernel produces a decision.

use std::sync::Arc;

use guard_primitives::{CallerContext, PrincipalId, ProposedCall};
use tracing::{debug, warn};

use crate::decision::Decision;

/// Observer invoked whenever an authorization decision is produced.
pub trait DecisionObserver: Send + Sync {
    /// Records the decision emitted for `call` on behalf of `principal`.
    fn on_decision(
        &self,
        principal: &PrincipalId,
        call: &ProposedCall,
        context: &CallerContext,
        decision: &Decision,
    );
}

/// Observer that emits decisions to the tracing system.
#[derive(Debug, Default)]
pub struct TracingDecisionObserver;

impl DecisionObserver for TracingDecisionObserver {
    fn on_decision(
        &self,
        principal: &PrincipalId,
        call: &ProposedCall,
        _context: &CallerContext,
        decision: &Decision,
    ) {
        if decision.is_allowed() {
            debug!(principal = %principal, tool = call.tool(), "call authorized");
        } else {
            warn!(
                principal = %principal,
                tool = call.tool(),
                reason = %decision.reason(),
                constraint = decision.failed_constraint(),
                "call denied"
            );
        }
    }
}

/// Composite observer that forwards decisions to a collection of observers.
#[derive(Default)]
pub struct CompositeDecisionObserver {
    observers: Vec<Arc<dyn DecisionObserver>>,
}

impl CompositeDecisionObserver {
    /// Creates a new composite observer from the supplied list.
    #[must_use]
    pub fn new<I>(observers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn DecisionObserver>>,
    {
        Self {
            observers: observers.into_iter().collect(),
        }
    }

    /// Adds an observer to the composite set.
    pub fn push(&mut self, observer: Arc<dyn DecisionObserver>) {
        self.observers.push(observer);
    }

    /// Returns the number of forwarded observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns true when no observer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl DecisionObserver for CompositeDecisionObserver {
    fn on_decision(
        &self,
        principal: &PrincipalId,
        call: &ProposedCall,
        context: &CallerContext,
        decision: &Decision,
    ) {
        for observer in &self.observers {
            observer.on_decision(principal, call, context, decision);
        }
    }
}
