//! Repair advisors that rewrite rejected calls.
//!
//! An advisor receives the call text and the diagnostic it produced and
//! returns corrected text. Advisors never re-validate their output; the
//! caller runs the result back through verification.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use guard_config::RepairConfig;
use guard_primitives::ProposedCall;
use guard_tools::{ToolRegistry, TypeTag};
use regex::{Captures, Regex};
use serde_json::{Number, Value};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::call_text::{parse_call, render_call, strip_code_fences};

static MISSING_ARGUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Missing required argument: '([^']+)'").expect("static pattern compiles")
});
static TYPE_MISMATCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Type mismatch for '([^']+)': expected (\w+)").expect("static pattern compiles")
});
static UNKNOWN_TOOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Tool '([^']+)' not found").expect("static pattern compiles")
});

const DEFAULT_MAX_DISTANCE: usize = 3;

/// Result alias for repair model calls.
pub type RepairResult<T> = Result<T, RepairError>;

/// Failures of a model-backed repair.
#[derive(Debug, Error)]
pub enum RepairError {
    /// The model returned an error.
    #[error("repair model failed: {reason}")]
    Model {
        /// Provider-supplied explanation.
        reason: String,
    },
    /// The model did not answer in time.
    #[error("repair model timed out after {after:?}")]
    Timeout {
        /// Configured bound.
        after: Duration,
    },
}

impl RepairError {
    /// Convenience constructor for model failures.
    #[must_use]
    pub fn model(reason: impl Into<String>) -> Self {
        Self::Model {
            reason: reason.into(),
        }
    }
}

/// Strategy that proposes corrected call text.
#[async_trait]
pub trait RepairAdvisor: Send + Sync {
    /// Returns corrected text, or `call_text` unchanged when no fix applies.
    async fn repair(&self, call_text: &str, error_message: &str) -> String;
}

/// Deterministic advisor keyed on diagnostic messages.
///
/// - missing argument: inserts a configured fill value;
/// - type mismatch: quotes or unquotes the offending scalar;
/// - unknown tool: substitutes an alias or the closest registered name.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedRepair {
    fills: BTreeMap<String, Value>,
    aliases: BTreeMap<String, String>,
    registry: Option<Arc<ToolRegistry>>,
    max_distance: Option<usize>,
}

impl RuleBasedRepair {
    /// Creates an advisor with no fills, aliases, or registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an advisor from repair settings and the live registry.
    #[must_use]
    pub fn from_config(config: &RepairConfig, registry: Arc<ToolRegistry>) -> Self {
        Self {
            fills: config.fills.clone(),
            aliases: config.aliases.clone(),
            registry: Some(registry),
            max_distance: None,
        }
    }

    /// Sets the value inserted when `field` is missing.
    #[must_use]
    pub fn with_fill(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fills.insert(field.into(), value.into());
        self
    }

    /// Maps an unknown tool name, or its last segment, to a replacement.
    #[must_use]
    pub fn with_alias(mut self, unknown: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.aliases.insert(unknown.into(), replacement.into());
        self
    }

    /// Enables nearest-name substitution against `registry`.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the largest edit distance accepted for nearest-name substitution.
    #[must_use]
    pub fn with_max_distance(mut self, distance: usize) -> Self {
        self.max_distance = Some(distance);
        self
    }

    fn rewrite(&self, text: &str, error: &str) -> Option<String> {
        if let Some(caps) = MISSING_ARGUMENT.captures(error) {
            return self.fill_missing(text, &caps[1]);
        }
        if let Some(caps) = TYPE_MISMATCH.captures(error) {
            return coerce(text, &caps[1], TypeTag::from_declared(&caps[2]));
        }
        if let Some(caps) = UNKNOWN_TOOL.captures(error) {
            return self.rename(text, &caps[1]);
        }
        None
    }

    fn fill_missing(&self, text: &str, field: &str) -> Option<String> {
        let value = self.fills.get(field)?;
        if let Ok(call) = parse_call(text) {
            let mut args = call.args().clone();
            args.insert(field.to_owned(), value.clone());
            return Some(render_call(&ProposedCall::with_args(call.tool(), args)));
        }

        let at = text.rfind('}')?;
        let head = text[..at].trim_end();
        let separator = if head.ends_with('{') { "" } else { ", " };
        let key = Value::String(field.to_owned());
        Some(format!("{head}{separator}{key}: {value}{}", &text[at..]))
    }

    fn rename(&self, text: &str, unknown: &str) -> Option<String> {
        let replacement = self.replacement_for(unknown)?;
        debug!(unknown, replacement = %replacement, "substituting tool name");
        match parse_call(text) {
            Ok(call) if call.tool() == unknown => Some(render_call(&ProposedCall::with_args(
                replacement,
                call.args().clone(),
            ))),
            _ => replace_identifier(text, unknown, &replacement),
        }
    }

    fn replacement_for(&self, unknown: &str) -> Option<String> {
        if let Some(alias) = self.aliases.get(unknown) {
            return Some(alias.clone());
        }
        if let Some((prefix, last)) = unknown.rsplit_once('.') {
            if let Some(alias) = self.aliases.get(last) {
                return Some(format!("{prefix}.{alias}"));
            }
        }
        self.nearest(unknown)
    }

    fn nearest(&self, unknown: &str) -> Option<String> {
        let catalog = self.registry.as_ref()?.snapshot();
        let limit = self.max_distance.unwrap_or(DEFAULT_MAX_DISTANCE);
        catalog
            .names()
            .into_iter()
            .map(|name| (strsim::levenshtein(unknown, name), name))
            .filter(|(distance, _)| *distance <= limit)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, name)| name.to_owned())
    }
}

#[async_trait]
impl RepairAdvisor for RuleBasedRepair {
    async fn repair(&self, call_text: &str, error_message: &str) -> String {
        match self.rewrite(call_text, error_message) {
            Some(repaired) => repaired,
            None => {
                debug!(error = error_message, "no repair rule applies");
                call_text.to_owned()
            }
        }
    }
}

fn coerce(text: &str, field: &str, expected: TypeTag) -> Option<String> {
    if let Ok(call) = parse_call(text) {
        let mut args = call.args().clone();
        let fixed = coerce_value(args.get(field)?, expected)?;
        args.insert(field.to_owned(), fixed);
        return Some(render_call(&ProposedCall::with_args(call.tool(), args)));
    }

    let key = regex::escape(field);
    let rewritten = if expected == TypeTag::String {
        let bare = Regex::new(&format!(r#"(["']{key}["']\s*:\s*)(-?[\w.]+)"#)).ok()?;
        bare.replace_all(text, |caps: &Captures<'_>| format!("{}\"{}\"", &caps[1], &caps[2]))
    } else {
        let quoted = Regex::new(&format!(r#"(["']{key}["']\s*:\s*)["']([^"']*)["']"#)).ok()?;
        quoted.replace_all(text, |caps: &Captures<'_>| {
            match coerce_value(&Value::String(caps[2].to_owned()), expected) {
                Some(value) => format!("{}{value}", &caps[1]),
                None => caps[0].to_owned(),
            }
        })
    };
    (rewritten != text).then(|| rewritten.into_owned())
}

fn coerce_value(value: &Value, expected: TypeTag) -> Option<Value> {
    match (expected, value) {
        (TypeTag::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        (TypeTag::Number, Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .map(Value::from)
                .or_else(|| s.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number))
        }
        (TypeTag::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (TypeTag::String, Value::Number(_) | Value::Bool(_)) => Some(Value::String(value.to_string())),
        _ => None,
    }
}

fn replace_identifier(text: &str, old: &str, new: &str) -> Option<String> {
    let pattern = Regex::new(&format!(r"(^|[^\w.]){}([^\w.]|$)", regex::escape(old))).ok()?;
    let rewritten = pattern.replace_all(text, |caps: &Captures<'_>| {
        format!("{}{new}{}", &caps[1], &caps[2])
    });
    (rewritten != text).then(|| rewritten.into_owned())
}

/// Prompt handed to a [`RepairModel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairPrompt {
    /// Instructions for the model.
    pub system: String,
    /// The call text and the error it produced.
    pub user: String,
}

impl RepairPrompt {
    /// Builds the prompt for one repair.
    #[must_use]
    pub fn new(call_text: &str, error_message: &str) -> Self {
        Self {
            system: "You fix tool calls rejected by a verifier. Return only the corrected call, \
                     with no markdown formatting or explanation."
                .to_owned(),
            user: format!("Call:\n{call_text}\n\nError:\n{error_message}\n\nCorrected call:"),
        }
    }
}

/// External model consulted by [`ModelRepair`].
#[async_trait]
pub trait RepairModel: Send + Sync {
    /// Returns the model's reply to `prompt`.
    async fn complete(&self, prompt: &RepairPrompt) -> RepairResult<String>;
}

/// Advisor delegating to an external model under a timeout.
///
/// Timeouts, model errors, and empty replies all yield the original text.
pub struct ModelRepair<M> {
    model: M,
    timeout: Duration,
}

impl<M> fmt::Debug for ModelRepair<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRepair")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<M: RepairModel> ModelRepair<M> {
    /// Wraps `model` with a five second timeout.
    #[must_use]
    pub fn new(model: M) -> Self {
        Self {
            model,
            timeout: Duration::from_secs(5),
        }
    }

    /// Wraps `model` with the timeout configured in `config`.
    #[must_use]
    pub fn from_config(model: M, config: &RepairConfig) -> Self {
        Self::new(model).with_timeout(config.timeout())
    }

    /// Sets the timeout applied to each model call.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the timeout applied to each model call.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn ask(&self, prompt: &RepairPrompt) -> RepairResult<String> {
        timeout(self.timeout, self.model.complete(prompt))
            .await
            .map_err(|_| RepairError::Timeout {
                after: self.timeout,
            })?
    }
}

#[async_trait]
impl<M: RepairModel> RepairAdvisor for ModelRepair<M> {
    async fn repair(&self, call_text: &str, error_message: &str) -> String {
        let prompt = RepairPrompt::new(call_text, error_message);
        match self.ask(&prompt).await {
            Ok(reply) => {
                let cleaned = strip_code_fences(&reply);
                if cleaned.is_empty() {
                    warn!("repair model returned an empty reply");
                    call_text.to_owned()
                } else {
                    cleaned.to_owned()
                }
            }
            Err(error) => {
                warn!(%error, "model repair failed; keeping original call");
                call_text.to_owned()
            }
        }
    }
}
