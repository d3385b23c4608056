//! Constraint expressions attached to capability tokens.
//!
//! Expressions are data, never code. Families are recognised in a fixed
//! order and the first family that matches decides:
//!
//! 1. `<key>=<value>`: when `key` is present its stringified value must equal
//!    `value`; an absent key leaves the constraint vacuously satisfied.
//! 2. `ownedByUser`: `args.owner`, or failing that `args.user_id`, must equal
//!    `context.user_id`; vacuously satisfied when neither is present.
//! 3. `maxRecords=<N>`: fails when `args.limit` is an integer above `N`.
//! 4. `always`: unconditionally satisfied.
//!
//! Because equality comes first, `maxRecords=<N>` is an equality test on a
//! `maxRecords` argument unless the engine reserves that key with
//! [`ConstraintEngine::with_record_ceiling`], in which case it bounds
//! `args.limit` instead.
//!
//! Anything else is unrecognized and resolved by [`UnrecognizedPolicy`].
//! The default is [`UnrecognizedPolicy::FailOpen`], which lets a typo in a
//! constraint silently widen a grant; deployments that can should select
//! [`UnrecognizedPolicy::FailClosed`] and use `always` for intentional no-ops.

use std::borrow::Cow;

use guard_primitives::{ArgMap, CallerContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Key of the numeric ceiling family, reserved only when the engine enables
/// record ceilings.
pub const MAX_RECORDS_KEY: &str = "maxRecords";
/// Argument compared against a `maxRecords` ceiling.
pub const LIMIT_ARG: &str = "limit";
/// Ownership constraint keyword.
pub const OWNED_BY_USER: &str = "ownedByUser";
/// Unconditionally satisfied constraint keyword.
pub const ALWAYS: &str = "always";

const OWNERSHIP_ARGS: [&str; 2] = ["owner", "user_id"];

/// Outcome for expressions that match no known family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnrecognizedPolicy {
    /// Treat as satisfied.
    #[default]
    FailOpen,
    /// Treat as violated.
    FailClosed,
}

/// Parsed form of a constraint expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// `maxRecords=<N>`; `None` when `N` is not an integer.
    MaxRecords {
        /// Largest permitted `limit`.
        ceiling: Option<i64>,
    },
    /// `<key>=<value>`.
    Equals {
        /// Argument name.
        key: String,
        /// Required stringified value.
        value: String,
    },
    /// `ownedByUser`.
    OwnedByUser,
    /// `always`.
    Always,
    /// No family matched.
    Unrecognized,
}

impl Constraint {
    /// Parses an expression with equality tried first. Never fails: unknown
    /// shapes become [`Constraint::Unrecognized`].
    #[must_use]
    pub fn parse(expression: &str) -> Self {
        Self::parse_with(expression, false)
    }

    /// Parses an expression, reserving the `maxRecords` key for the numeric
    /// ceiling family when `record_ceiling` is set.
    #[must_use]
    pub fn parse_with(expression: &str, record_ceiling: bool) -> Self {
        let expression = expression.trim();

        if let Some((key, value)) = expression.split_once('=') {
            let key = key.trim();
            if record_ceiling && key == MAX_RECORDS_KEY {
                return Self::MaxRecords {
                    ceiling: value.trim().parse().ok(),
                };
            }
            if !key.is_empty() && !expression.starts_with("exclude") {
                return Self::Equals {
                    key: key.to_owned(),
                    value: value.trim().trim_matches('\'').trim_matches('"').to_owned(),
                };
            }
            return Self::Unrecognized;
        }

        match expression {
            OWNED_BY_USER => Self::OwnedByUser,
            ALWAYS => Self::Always,
            _ => Self::Unrecognized,
        }
    }
}

/// Evaluates constraint expressions against call arguments and context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintEngine {
    unrecognized: UnrecognizedPolicy,
    record_ceiling: bool,
}

impl ConstraintEngine {
    /// Creates an engine with the given treatment of unrecognized expressions.
    #[must_use]
    pub fn new(unrecognized: UnrecognizedPolicy) -> Self {
        Self {
            unrecognized,
            record_ceiling: false,
        }
    }

    /// Reserves `maxRecords=<N>` as a ceiling on `args.limit` instead of an
    /// equality test.
    #[must_use]
    pub fn with_record_ceiling(mut self, enabled: bool) -> Self {
        self.record_ceiling = enabled;
        self
    }

    /// Returns the treatment of unrecognized expressions.
    #[must_use]
    pub fn unrecognized_policy(&self) -> UnrecognizedPolicy {
        self.unrecognized
    }

    /// Returns true when `maxRecords` bounds `args.limit`.
    #[must_use]
    pub fn record_ceiling(&self) -> bool {
        self.record_ceiling
    }

    /// Returns whether `expression` holds for `args` under `context`.
    #[must_use]
    pub fn evaluate(&self, expression: &str, args: &ArgMap, context: &CallerContext) -> bool {
        match Constraint::parse_with(expression, self.record_ceiling) {
            Constraint::MaxRecords { ceiling } => within_ceiling(ceiling, args),
            Constraint::Equals { key, value } => args
                .get(&key)
                .is_none_or(|actual| stringify(actual) == value),
            Constraint::OwnedByUser => owned_by_user(args, context),
            Constraint::Always => true,
            Constraint::Unrecognized => match self.unrecognized {
                UnrecognizedPolicy::FailOpen => {
                    warn!(constraint = expression, "unrecognized constraint treated as satisfied");
                    true
                }
                UnrecognizedPolicy::FailClosed => false,
            },
        }
    }
}

fn stringify(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

fn owned_by_user(args: &ArgMap, context: &CallerContext) -> bool {
    OWNERSHIP_ARGS
        .iter()
        .find_map(|field| args.get(*field))
        .is_none_or(|claimed| context.user_id() == Some(claimed))
}

fn within_ceiling(ceiling: Option<i64>, args: &ArgMap) -> bool {
    let Some(ceiling) = ceiling else {
        return true;
    };
    args.get(LIMIT_ARG)
        .and_then(as_integer)
        .is_none_or(|limit| limit <= i128::from(ceiling))
}

#[allow(clippy::cast_possible_truncation)]
fn as_integer(value: &Value) -> Option<i128> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.abs() < 1e30)
                    .map(|f| f.trunc() as i128)
            }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
