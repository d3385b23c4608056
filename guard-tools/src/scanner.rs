//! Call-expression extraction from generated code blocks.
//!
//! The scanner is a small lexer rather than a full parser: it understands
//! string literals, line comments, and bracket nesting well enough to pull
//! out every `callee(` site of Python- or JavaScript-flavoured snippets.
//! The [`ScanDialect`] decides which line comment marker applies, since `//`
//! is floor division in Python.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Line comment syntax of a scanned block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanDialect {
    /// `#` starts a comment; `//` is an operator.
    #[default]
    Python,
    /// `//` starts a comment; `#` is an ordinary character.
    #[serde(rename = "javascript")]
    JavaScript,
}

/// A call expression found in a code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Dotted callee path, e.g. `salesforce.get_lead`.
    pub callee: String,
    /// One-based line where the callee starts.
    pub line: usize,
}

/// The block could not be tokenised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// Unbalanced brackets or an unterminated string literal.
    #[error("Syntax Error: {message} (line {line})")]
    Syntax {
        /// One-based line of the offending token.
        line: usize,
        /// What went wrong.
        message: String,
    },
}

const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "case", "catch", "class", "const",
    "continue", "def", "del", "elif", "else", "except", "finally", "fn", "for", "from",
    "function", "global", "if", "import", "in", "is", "lambda", "let", "match", "new",
    "nonlocal", "not", "or", "pass", "raise", "return", "switch", "try", "typeof", "var",
    "while", "with", "yield",
];

const DEFINING_KEYWORDS: &[&str] = &["def", "class", "fn", "function"];

struct Path {
    text: String,
    line: usize,
    definition: bool,
}

/// Extracts every call site of a Python block in order of appearance.
///
/// # Errors
///
/// Returns [`ScanError::Syntax`] for unbalanced brackets or unterminated
/// strings; no partial result is returned.
pub fn call_sites(code: &str) -> Result<Vec<CallSite>, ScanError> {
    call_sites_in(code, ScanDialect::Python)
}

/// Extracts every call site in order of appearance, reading comments as
/// `dialect` does.
///
/// # Errors
///
/// Returns [`ScanError::Syntax`] for unbalanced brackets or unterminated
/// strings; no partial result is returned.
pub fn call_sites_in(code: &str, dialect: ScanDialect) -> Result<Vec<CallSite>, ScanError> {
    let chars: Vec<char> = code.chars().collect();
    let mut sites = Vec::new();
    let mut brackets: Vec<(char, usize)> = Vec::new();
    let mut path: Option<Path> = None;
    let mut after_dot = false;
    let mut next_is_definition = false;
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
                if brackets.is_empty() {
                    path = None;
                    after_dot = false;
                }
            }
            c if c.is_whitespace() => i += 1,
            '#' if dialect == ScanDialect::Python => i = skip_line(&chars, i),
            '/' if dialect == ScanDialect::JavaScript && chars.get(i + 1) == Some(&'/') => {
                i = skip_line(&chars, i);
            }
            '\'' | '"' | '`' => {
                i = skip_string(&chars, i, &mut line)?;
                path = None;
                after_dot = false;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();

                match path.as_mut() {
                    Some(current) if after_dot => {
                        current.text.push('.');
                        current.text.push_str(&ident);
                    }
                    _ if KEYWORDS.contains(&ident.as_str()) => {
                        path = None;
                        next_is_definition = DEFINING_KEYWORDS.contains(&ident.as_str());
                    }
                    _ => {
                        path = Some(Path {
                            text: ident,
                            line,
                            definition: std::mem::take(&mut next_is_definition),
                        });
                    }
                }
                after_dot = false;
            }
            c if c.is_ascii_digit() => {
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '.' || chars[i] == '_') {
                    i += 1;
                }
                path = None;
                after_dot = false;
            }
            '.' => {
                after_dot = path.is_some();
                i += 1;
            }
            '(' | '[' | '{' => {
                if c == '(' {
                    if let Some(callee) = path.take().filter(|p| !p.definition) {
                        sites.push(CallSite {
                            callee: callee.text,
                            line: callee.line,
                        });
                    }
                }
                brackets.push((c, line));
                path = None;
                after_dot = false;
                next_is_definition = false;
                i += 1;
            }
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match brackets.pop() {
                    Some((open, _)) if open == expected => {}
                    _ => {
                        return Err(ScanError::Syntax {
                            line,
                            message: format!("unexpected '{c}'"),
                        });
                    }
                }
                path = None;
                after_dot = false;
                i += 1;
            }
            _ => {
                path = None;
                after_dot = false;
                i += 1;
            }
        }
    }

    if let Some((open, opened_at)) = brackets.pop() {
        return Err(ScanError::Syntax {
            line: opened_at,
            message: format!("'{open}' was never closed"),
        });
    }

    Ok(sites)
}

fn skip_line(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i] != '\n' {
        i += 1;
    }
    i
}

fn skip_string(chars: &[char], start: usize, line: &mut usize) -> Result<usize, ScanError> {
    let quote = chars[start];
    let opened_at = *line;
    let triple = quote != '`'
        && chars.get(start + 1) == Some(&quote)
        && chars.get(start + 2) == Some(&quote);
    let mut i = if triple { start + 3 } else { start + 1 };

    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '\n' if !triple && quote != '`' => break,
            '\n' => {
                *line += 1;
                i += 1;
            }
            c if c == quote => {
                if !triple {
                    return Ok(i + 1);
                }
                if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                    return Ok(i + 3);
                }
                i += 1;
            }
            _ => i += 1,
        }
    }

    Err(ScanError::Syntax {
        line: opened_at,
        message: "unterminated string literal".into(),
    })
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {})", self.callee, self.line)
    }
}
