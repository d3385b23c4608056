//! Principal identifier types.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

const MAX_ID_LEN: usize = 128;

/// Identity on whose behalf a tool call is made.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Creates a principal identifier after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPrincipalId`] if the identifier is empty, too
    /// long, or contains whitespace or control characters.
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidPrincipalId {
                id,
                reason: "identifier cannot be empty".into(),
            });
        }
        if id.len() > MAX_ID_LEN {
            return Err(Error::InvalidPrincipalId {
                id,
                reason: format!("identifier length must be <= {MAX_ID_LEN}"),
            });
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(Error::InvalidPrincipalId {
                id,
                reason: "identifier cannot contain whitespace or control characters".into(),
            });
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PrincipalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PrincipalId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PrincipalId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PrincipalId> for String {
    fn from(value: PrincipalId) -> Self {
        value.0
    }
}
