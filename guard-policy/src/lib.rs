//! Authorization of proposed tool calls against capability tokens.
//!
//! A call is allowed when at least one of the principal's tokens matches the
//! tool name and every constraint on that token holds for the call's
//! arguments and the caller's context. Evaluation is pure and stateless; the
//! token store is the only shared state and is swapped atomically on reload.

#![warn(missing_docs, clippy::pedantic)]

pub mod constraint;
pub mod decision;
pub mod engine;
pub mod learner;
pub mod observer;
pub mod store;

pub use constraint::{Constraint, ConstraintEngine, UnrecognizedPolicy};
pub use decision::{Decision, ReasonCode, ViolationDetail};
pub use engine::{AuthorizationKernel, PolicyError, PolicyResult};
pub use learner::suggest;
pub use observer::{CompositeDecisionObserver, DecisionObserver, TracingDecisionObserver};
pub use store::{PrincipalRecord, StaticTokenStore, TokenSource};
