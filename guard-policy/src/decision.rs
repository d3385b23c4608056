//! Authorization decisions returned by the kernel.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    /// A matching token had every constraint satisfied.
    Allowed,
    /// No held token matches the tool name.
    NoCapabilityToken,
    /// Tokens match, but each has at least one failing constraint.
    ConstraintViolation,
}

impl ReasonCode {
    /// Returns the code as a static string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "Allowed",
            Self::NoCapabilityToken => "NoCapabilityToken",
            Self::ConstraintViolation => "ConstraintViolation",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Debugging hint attached to constraint violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationDetail {
    /// Tool the call targeted.
    pub tool: String,
    /// First failing expression of the last token tried.
    pub failed_constraint: String,
}

/// Structured allow/deny decision for one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    allowed: bool,
    reason: ReasonCode,
    #[serde(
        default,
        rename = "violation_detail",
        alias = "violation",
        skip_serializing_if = "Option::is_none"
    )]
    violation: Option<ViolationDetail>,
}

impl Decision {
    /// Returns an allow decision.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: ReasonCode::Allowed,
            violation: None,
        }
    }

    /// Returns a denial for a principal holding no matching token.
    #[must_use]
    pub fn no_capability_token() -> Self {
        Self {
            allowed: false,
            reason: ReasonCode::NoCapabilityToken,
            violation: None,
        }
    }

    /// Returns a denial naming the constraint that failed.
    #[must_use]
    pub fn constraint_violation(tool: impl Into<String>, failed_constraint: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: ReasonCode::ConstraintViolation,
            violation: Some(ViolationDetail {
                tool: tool.into(),
                failed_constraint: failed_constraint.into(),
            }),
        }
    }

    /// Returns true when the call may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Returns the reason code.
    #[must_use]
    pub fn reason(&self) -> ReasonCode {
        self.reason
    }

    /// Returns the violation detail for constraint denials.
    #[must_use]
    pub fn violation(&self) -> Option<&ViolationDetail> {
        self.violation.as_ref()
    }

    /// Returns the failing constraint expression, if any.
    #[must_use]
    pub fn failed_constraint(&self) -> Option<&str> {
        self.violation.as_ref().map(|v| v.failed_constraint.as_str())
    }
}
