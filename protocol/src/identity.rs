//! # Caller Identity
//!
//! The registry never authenticates anybody. An external identity source
//! hands us a string and we treat it as an opaque, comparable value: the
//! owner of a project, the verifier signing off on it, or the NGO wallet
//! receiving its cut of the revenue.
//!
//! The one thing we *do* interpret is the null identity. An empty string or
//! an all-zero hex address (`0x0000…`) is never a valid recipient.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::HEX_IDENTITY_PREFIX;

/// Errors produced when parsing an identity from user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The input was empty or only whitespace.
    #[error("identity must not be empty")]
    Empty,

    /// The input contained whitespace, which no identity source emits.
    #[error("identity must not contain whitespace: {0:?}")]
    ContainsWhitespace(String),
}

/// An opaque caller or recipient identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wraps a raw identity string without validation.
    ///
    /// Use [`str::parse`] for user input; this constructor exists for
    /// identities that arrive from an already-trusted source.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The null identity. Never a valid owner or payout recipient.
    pub fn null() -> Self {
        Self(String::new())
    }

    /// Returns `true` for the empty identity or an all-zero hex address.
    pub fn is_null(&self) -> bool {
        let trimmed = self.0.trim();
        if trimmed.is_empty() {
            return true;
        }
        let digits = trimmed
            .strip_prefix(HEX_IDENTITY_PREFIX)
            .unwrap_or(trimmed);
        !digits.is_empty() && digits.chars().all(|c| c == '0')
    }

    /// Borrows the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<null>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(IdentityError::Empty);
        }
        if s.chars().any(char::is_whitespace) {
            return Err(IdentityError::ContainsWhitespace(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
