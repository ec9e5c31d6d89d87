//! Caller-submitted provider credentials and the redaction wrapper that keeps
//! them out of logs.

use serde::{Deserialize, Serialize};

use std::fmt;

/// A wrapper that redacts secret values in Debug and Display output.
///
/// Use this to wrap any `String` that might contain sensitive data.
/// The actual value is accessible via `.expose()`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Redacted(String);

impl Redacted {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the underlying secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Redacted(\"***\")")
    }
}

impl fmt::Display for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

/// Credentials submitted for one provider login.
///
/// Held only for the lifetime of the link session. The username is not
/// secret (reviewers see it); the password and security answer are.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub username: String,
    pub password: Redacted,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_answer: Option<Redacted>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Redacted::new(password),
            security_answer: None,
        }
    }

    pub fn with_security_answer(mut self, answer: impl Into<String>) -> Self {
        self.security_answer = Some(Redacted::new(answer));
        self
    }

    /// Whether a non-blank security answer was supplied.
    pub fn has_security_answer(&self) -> bool {
        self.security_answer
            .as_ref()
            .is_some_and(|answer| !answer.is_blank())
    }
}
