//! Shared error definitions for mediation primitives.

use thiserror::Error;

/// Result alias used throughout the mediation kernel.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The provided principal identifier failed validation.
    #[error("invalid principal id `{id}`: {reason}")]
    InvalidPrincipalId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Token name pattern failed validation.
    #[error("invalid token pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// The offending pattern string.
        pattern: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Operation label failed validation.
    #[error("invalid operation `{operation}`: {reason}")]
    InvalidOperation {
        /// The offending operation label.
        operation: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Capability token definition failed validation.
    #[error("invalid capability token: {reason}")]
    InvalidToken {
        /// Human-readable reason for rejection.
        reason: String,
    },
}
