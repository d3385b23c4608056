//! Core shared types for the tool-call mediation kernel.

#![warn(missing_docs, clippy::pedantic)]

mod capability;
mod context;
mod error;
mod ids;

/// Capability tokens, name patterns, and operation labels.
pub use capability::{
    CapabilityToken, CapabilityTokenBuilder, Operation, PatternPart, TokenPattern,
};
/// Proposed calls, argument maps, and per-request caller context.
pub use context::{ArgMap, CallerContext, ProposedCall, USER_ID_KEY};
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Identity of the principal on whose behalf a call is made.
pub use ids::PrincipalId;
