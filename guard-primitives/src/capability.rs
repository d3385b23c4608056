//! Capability tokens held by principals.
//!
//! A token grants access to every tool whose name matches its
//! [`TokenPattern`], subject to the token's constraint expressions. Patterns
//! are compiled into a small AST of literal and wildcard parts instead of a
//! regular expression, so tool names containing regex metacharacters are
//! always matched literally.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_PATTERN_LEN: usize = 256;
const MAX_OPERATION_LEN: usize = 32;

/// One part of a compiled token pattern.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum PatternPart {
    /// Characters that must appear verbatim.
    Literal(String),
    /// `*`: any run of characters, dot separators included.
    Wildcard,
}

/// Glob-style tool name pattern, e.g. `salesforce.*` or `gdrive.read_file`.
///
/// `*` matches any remainder of the name; `\*` and `\\` escape a literal
/// asterisk or backslash.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenPattern {
    parts: Vec<PatternPart>,
}

impl TokenPattern {
    /// Parses a glob pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the pattern is blank, too long, or
    /// ends with a dangling escape.
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern.trim().is_empty() {
            return Err(invalid_pattern(pattern, "pattern cannot be empty"));
        }
        if pattern.len() > MAX_PATTERN_LEN {
            return Err(invalid_pattern(
                pattern,
                &format!("pattern length must be <= {MAX_PATTERN_LEN}"),
            ));
        }

        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped @ ('*' | '\\')) => literal.push(escaped),
                    Some(other) => {
                        literal.push('\\');
                        literal.push(other);
                    }
                    None => return Err(invalid_pattern(pattern, "dangling escape")),
                },
                '*' => {
                    if !literal.is_empty() {
                        parts.push(PatternPart::Literal(std::mem::take(&mut literal)));
                    }
                    if parts.last() != Some(&PatternPart::Wildcard) {
                        parts.push(PatternPart::Wildcard);
                    }
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            parts.push(PatternPart::Literal(literal));
        }

        Ok(Self { parts })
    }

    /// Builds a pattern that matches exactly one name, never a wildcard.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the name is blank.
    pub fn exact(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(invalid_pattern(&name, "pattern cannot be empty"));
        }
        Ok(Self::literal(name))
    }

    /// Builds a pattern matching exactly `name`, which may be empty.
    #[must_use]
    pub fn literal(name: impl Into<String>) -> Self {
        let name = name.into();
        let parts = if name.is_empty() {
            Vec::new()
        } else {
            vec![PatternPart::Literal(name)]
        };
        Self { parts }
    }

    /// Returns the compiled parts.
    #[must_use]
    pub fn parts(&self) -> &[PatternPart] {
        &self.parts
    }

    /// Returns true when the pattern contains no wildcard.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        !self.parts.contains(&PatternPart::Wildcard)
    }

    /// Returns true when the pattern matches the whole of `name`.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let mut rest = name;
        let mut anchored = true;
        let last = self.parts.len().saturating_sub(1);

        for (index, part) in self.parts.iter().enumerate() {
            match part {
                PatternPart::Wildcard => anchored = false,
                PatternPart::Literal(lit) => {
                    if index == last {
                        return if anchored {
                            rest == lit
                        } else {
                            rest.ends_with(lit.as_str())
                        };
                    }
                    if anchored {
                        match rest.strip_prefix(lit.as_str()) {
                            Some(remainder) => rest = remainder,
                            None => return false,
                        }
                    } else {
                        // Leftmost match is sufficient: only `*` can follow.
                        match rest.find(lit.as_str()) {
                            Some(at) => rest = &rest[at + lit.len()..],
                            None => return false,
                        }
                    }
                    anchored = true;
                }
            }
        }

        !anchored || rest.is_empty()
    }
}

impl Display for TokenPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                PatternPart::Wildcard => f.write_str("*")?,
                PatternPart::Literal(lit) => {
                    for c in lit.chars() {
                        if matches!(c, '*' | '\\') {
                            f.write_str("\\")?;
                        }
                        write!(f, "{c}")?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl FromStr for TokenPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TokenPattern {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TokenPattern> for String {
    fn from(value: TokenPattern) -> Self {
        value.to_string()
    }
}

fn invalid_pattern(pattern: &str, reason: &str) -> Error {
    Error::InvalidPattern {
        pattern: pattern.into(),
        reason: reason.into(),
    }
}

/// Advisory operation label such as `read`, `write`, or `execute`.
///
/// Labels describe the grant for humans and governance tooling; the kernel
/// does not enforce them against calls.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Operation(String);

impl Operation {
    /// Creates an operation label after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] if the label is empty, too long, or
    /// contains characters other than lowercase alphanumerics, `-`, `_`, `:`.
    pub fn new(label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        if label.is_empty() {
            return Err(Error::InvalidOperation {
                operation: label,
                reason: "operation cannot be empty".into(),
            });
        }
        if label.len() > MAX_OPERATION_LEN {
            return Err(Error::InvalidOperation {
                operation: label,
                reason: format!("operation length must be <= {MAX_OPERATION_LEN}"),
            });
        }
        if !label
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-' | '_' | ':'))
        {
            return Err(Error::InvalidOperation {
                operation: label,
                reason: "operation must contain lowercase alphanumeric, dash, underscore, or colon"
                    .into(),
            });
        }
        Ok(Self(label))
    }

    /// The `read` label.
    #[must_use]
    pub fn read() -> Self {
        Self("read".into())
    }

    /// The `write` label.
    #[must_use]
    pub fn write() -> Self {
        Self("write".into())
    }

    /// The `execute` label.
    #[must_use]
    pub fn execute() -> Self {
        Self("execute".into())
    }

    /// Returns the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Operation {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Operation> for String {
    fn from(value: Operation) -> Self {
        value.0
    }
}

/// Authorization grant held by a principal.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CapabilityToken {
    pattern: TokenPattern,
    #[serde(default)]
    operations: BTreeSet<Operation>,
    #[serde(default)]
    constraints: Vec<String>,
    #[serde(default)]
    description: String,
}

impl CapabilityToken {
    /// Starts building a token for the supplied pattern.
    #[must_use]
    pub fn builder(pattern: TokenPattern) -> CapabilityTokenBuilder {
        CapabilityTokenBuilder {
            pattern,
            operations: BTreeSet::new(),
            constraints: Vec::new(),
            description: String::new(),
        }
    }

    /// Parses the pattern and operation labels and assembles a token.
    ///
    /// # Errors
    ///
    /// Returns the first pattern, operation, or constraint validation error.
    pub fn new<O, C>(
        pattern: &str,
        operations: O,
        constraints: C,
        description: impl Into<String>,
    ) -> Result<Self>
    where
        O: IntoIterator,
        O::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let mut builder = Self::builder(TokenPattern::parse(pattern)?).description(description);
        for operation in operations {
            builder = builder.operation(operation)?;
        }
        for constraint in constraints {
            builder = builder.constraint(constraint)?;
        }
        Ok(builder.build())
    }

    /// Returns the tool name pattern.
    #[must_use]
    pub fn pattern(&self) -> &TokenPattern {
        &self.pattern
    }

    /// Returns the advisory operation labels.
    #[must_use]
    pub fn operations(&self) -> &BTreeSet<Operation> {
        &self.operations
    }

    /// Returns the constraint expressions in evaluation order.
    #[must_use]
    pub fn constraints(&self) -> &[String] {
        &self.constraints
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns true when the token's pattern matches the whole tool name.
    #[must_use]
    pub fn matches(&self, tool_name: &str) -> bool {
        self.pattern.matches(tool_name)
    }
}

/// Builder for [`CapabilityToken`].
#[derive(Debug)]
pub struct CapabilityTokenBuilder {
    pattern: TokenPattern,
    operations: BTreeSet<Operation>,
    constraints: Vec<String>,
    description: String,
}

impl CapabilityTokenBuilder {
    /// Adds an operation label.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] if the label fails validation.
    pub fn operation(mut self, label: impl Into<String>) -> Result<Self> {
        self.operations.insert(Operation::new(label)?);
        Ok(self)
    }

    /// Appends a constraint expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToken`] if the expression is blank.
    pub fn constraint(mut self, expression: impl Into<String>) -> Result<Self> {
        let expression = expression.into();
        if expression.trim().is_empty() {
            return Err(Error::InvalidToken {
                reason: "constraint expression cannot be empty".into(),
            });
        }
        self.constraints.push(expression);
        Ok(self)
    }

    /// Adds an already validated operation.
    #[must_use]
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.insert(operation);
        self
    }

    /// Appends a constraint expression; blank expressions are skipped.
    #[must_use]
    pub fn with_constraint(mut self, expression: impl Into<String>) -> Self {
        let expression = expression.into();
        if !expression.trim().is_empty() {
            self.constraints.push(expression);
        }
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Finalises the token.
    #[must_use]
    pub fn build(self) -> CapabilityToken {
        CapabilityToken {
            pattern: self.pattern,
            operations: self.operations,
            constraints: self.constraints,
            description: self.description,
        }
    }
}
