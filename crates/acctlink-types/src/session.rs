//! Link session types: the server-held token and its authentication stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::secret::Credentials;

/// Opaque, unguessable identifier for one linking attempt.
///
/// `Debug` prints only a short prefix so tokens never land in logs whole.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First few characters, for log correlation.
    pub fn prefix(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(10)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken(\"{}…\")", self.prefix())
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authentication stage of a link session.
///
/// Declaration order is progression order; a session's stage only ever
/// moves to a greater variant. `Expired` is never stored -- it is derived
/// from `expires_at` at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStage {
    Initiated,
    Authenticated,
    ChallengeIssued,
    ChallengeCollected,
    Finalized,
}

impl LinkStage {
    /// Stages from which `submit_challenge` is accepted.
    pub const CHALLENGE_OPEN: [LinkStage; 3] = [
        LinkStage::Authenticated,
        LinkStage::ChallengeIssued,
        LinkStage::ChallengeCollected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStage::Initiated => "initiated",
            LinkStage::Authenticated => "authenticated",
            LinkStage::ChallengeIssued => "challenge_issued",
            LinkStage::ChallengeCollected => "challenge_collected",
            LinkStage::Finalized => "finalized",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LinkStage::Finalized)
    }
}

impl fmt::Display for LinkStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(LinkStage::Initiated),
            "authenticated" => Ok(LinkStage::Authenticated),
            "challenge_issued" => Ok(LinkStage::ChallengeIssued),
            "challenge_collected" => Ok(LinkStage::ChallengeCollected),
            "finalized" => Ok(LinkStage::Finalized),
            other => Err(format!("invalid link stage: '{other}'")),
        }
    }
}

/// One linking attempt.
///
/// Created on successful credential submission and mutated only by stage
/// transitions. Never deleted: once `expires_at` passes or `is_active` is
/// cleared it is treated as absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSession {
    pub token: SessionToken,
    pub provider_id: String,
    pub owner_id: String,
    pub credentials: Credentials,
    pub stage: LinkStage,
    pub collected_code: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LinkSession {
    /// Whether the session may still be used at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now < self.expires_at
    }

    /// Move the session forward to `next`.
    ///
    /// Returns an error (and leaves the session untouched) if `next` would
    /// not be a strict advance, except for the re-entrant
    /// `ChallengeCollected -> ChallengeCollected` case.
    pub fn advance(&mut self, next: LinkStage) -> Result<(), String> {
        let reentrant = self.stage == LinkStage::ChallengeCollected
            && next == LinkStage::ChallengeCollected;
        if next <= self.stage && !reentrant {
            return Err(format!(
                "illegal stage transition: {} -> {}",
                self.stage, next
            ));
        }
        self.stage = next;
        Ok(())
    }
}
