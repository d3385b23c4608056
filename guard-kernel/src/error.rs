//! Error types surfaced by the mediation pipeline.

use guard_policy::PolicyError;
use guard_tools::ToolError;
use thiserror::Error;

/// Errors raised while assembling or driving the pipeline.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Call text could not be read as a tool call.
    #[error("MalformedCall: {reason}")]
    MalformedCall {
        /// Why parsing failed.
        reason: String,
    },
    /// The tool catalog failed to load.
    #[error(transparent)]
    Tools(#[from] ToolError),
    /// Policy data failed to load.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl GuardError {
    /// Convenience constructor for unreadable call text.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedCall {
            reason: reason.into(),
        }
    }
}

/// Result alias for pipeline operations.
pub type GuardResult<T> = Result<T, GuardError>;
