//! Dotted parameter paths.
//!
//! Parses paths like `shell.prompt`, `key.github.token` or `proc.deploy`
//! into an ordered token list. Empty segments are discarded, so
//! `..shell..prompt.` and `shell.prompt` name the same entry.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::StoreError;


/// An ordered, non-empty sequence of non-empty tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParameterPath {
    tokens: Vec<String>,
}

impl ParameterPath {
    /// Parse a dotted string into a path.
    ///
    /// Fails with `InvalidPath` when no token survives splitting, or when a
    /// token contains whitespace.
    pub fn parse(input: &str) -> Result<Self, StoreError> {
        let tokens = split_tokens(input)?;
        if tokens.is_empty() {
            return Err(StoreError::InvalidPath {
                path: input.to_string(),
                reason: "path has no token".into(),
            });
        }
        Ok(ParameterPath { tokens })
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Format back to a dotted string.
    pub fn to_dotted(&self) -> String {
        self.tokens.join(".")
    }
}

impl fmt::Display for ParameterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dotted())
    }
}

impl TryFrom<String> for ParameterPath {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ParameterPath::parse(&value)
    }
}

impl From<ParameterPath> for String {
    fn from(path: ParameterPath) -> Self {
        path.to_dotted()
    }
}


/// Split a dotted prefix into tokens. Unlike `ParameterPath::parse`, an
/// empty result is allowed and selects the whole store.
pub fn split_prefix(input: &str) -> Result<Vec<String>, StoreError> {
    split_tokens(input)
}


fn split_tokens(input: &str) -> Result<Vec<String>, StoreError> {
    let mut tokens = Vec::new();
    for part in input.split('.') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if part.chars().any(char::is_whitespace) {
            return Err(StoreError::InvalidPath {
                path: input.to_string(),
                reason: format!("token '{}' contains whitespace", part),
            });
        }
        tokens.push(part.to_string());
    }
    Ok(tokens)
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
