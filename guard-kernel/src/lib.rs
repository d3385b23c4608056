//! Verification guard and mediation pipeline for agent tool calls.
//!
//! This crate ties the tool catalog and the authorization kernel together:
//! a proposed call is checked for structure by [`VerificationGuard`], then
//! for access by the policy kernel, and [`Mediator`] drives both. Rejected
//! call text can be fed through a [`RepairAdvisor`] and re-verified.

#![warn(missing_docs, clippy::pedantic)]

pub mod call_text;
mod error;
mod guard;
mod mediator;
pub mod repair;

pub use call_text::{parse_call, render_call};
pub use error::{GuardError, GuardResult};
pub use guard::{Diagnostic, VerificationGuard};
pub use mediator::{Mediation, Mediator, RepairOutcome};
pub use repair::{
    ModelRepair, RepairAdvisor, RepairError, RepairModel, RepairPrompt, RepairResult,
    RuleBasedRepair,
};
