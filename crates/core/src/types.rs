//! Domain types shared across the workspace

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret string that zeroizes on drop and never prints its contents
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the raw value. Callers must not log the result.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Pre-defined command the agent may run on request.
///
/// Task definitions only ever come from configuration at startup; no request
/// input is used to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub name: String,
    pub command: String,
    pub description: String,
    /// Requires explicit caller confirmation before it runs
    pub dangerous: bool,
}

impl TaskDefinition {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        description: impl Into<String>,
        dangerous: bool,
    ) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            description: description.into(),
            dangerous,
        }
    }
}

/// True only for a list holding the wildcard as its single entry
#[must_use]
pub fn is_wildcard_list(entries: &[String]) -> bool {
    matches!(entries, [only] if only == crate::constants::WILDCARD)
}

/// How a request proved its identity at the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Presented the shared secret itself
    Secret,
    /// Presented a signed session token
    Session,
}
