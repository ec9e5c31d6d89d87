//! Submissions: the durable result of a completed link workflow, and the
//! review decisions applied to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::account::LinkedAccount;

/// Review state of a submission.
///
/// Starts `Pending` and moves to a terminal state exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Declined,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Declined => "declined",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReviewStatus::Pending)
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ReviewStatus::Pending),
            "approved" => Ok(ReviewStatus::Approved),
            "declined" => Ok(ReviewStatus::Declined),
            other => Err(format!("invalid review status: '{other}'")),
        }
    }
}

/// A reviewer's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Decline,
}

impl ReviewAction {
    /// Terminal status this action produces.
    pub fn resulting_status(&self) -> ReviewStatus {
        match self {
            ReviewAction::Approve => ReviewStatus::Approved,
            ReviewAction::Decline => ReviewStatus::Declined,
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewAction::Approve => write!(f, "approve"),
            ReviewAction::Decline => write!(f, "decline"),
        }
    }
}

impl FromStr for ReviewAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approve" => Ok(ReviewAction::Approve),
            "decline" => Ok(ReviewAction::Decline),
            other => Err(format!("invalid review action: '{other}'")),
        }
    }
}

/// A finalized connection awaiting (or past) human review.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub provider_id: String,
    pub provider_name: String,
    pub owner_id: String,
    /// Login name used at the provider. The password is never persisted here.
    pub username: String,
    /// Code the user typed at the challenge step, if any.
    pub challenge_code: Option<String>,
    /// Code that was issued for the session, for reviewer comparison.
    pub issued_code: Option<String>,
    pub connected_at: DateTime<Utc>,
    pub review_status: ReviewStatus,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
    pub accounts: Vec<LinkedAccount>,
}

/// A decision to apply to a pending submission.
#[derive(Debug, Clone)]
pub struct ReviewDecision {
    pub action: ReviewAction,
    pub reviewed_by: String,
    pub reviewed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Result of attempting to apply a [`ReviewDecision`].
#[derive(Debug, Clone)]
pub enum ReviewOutcome {
    /// The decision was applied; carries the updated submission.
    Decided(Submission),
    /// The submission had already left `Pending`.
    AlreadyDecided(ReviewStatus),
    NotFound,
}

/// Counts per review status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub pending: u64,
    pub approved: u64,
    pub declined: u64,
}

impl ReviewStats {
    pub fn tally<'a>(submissions: impl IntoIterator<Item = &'a Submission>) -> Self {
        let mut stats = Self::default();
        for submission in submissions {
            match submission.review_status {
                ReviewStatus::Pending => stats.pending += 1,
                ReviewStatus::Approved => stats.approved += 1,
                ReviewStatus::Declined => stats.declined += 1,
            }
        }
        stats
    }

    pub fn total(&self) -> u64 {
        self.pending + self.approved + self.declined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_action_parse() {
        assert_eq!("approve".parse::<ReviewAction>().unwrap(), ReviewAction::Approve);
        assert_eq!("DECLINE".parse::<ReviewAction>().unwrap(), ReviewAction::Decline);
        assert!("delete".parse::<ReviewAction>().is_err());
    }

    #[test]
    fn test_action_resulting_status() {
        assert_eq!(ReviewAction::Approve.resulting_status(), ReviewStatus::Approved);
        assert_eq!(ReviewAction::Decline.resulting_status(), ReviewStatus::Declined);
    }

    #[test]
    fn test_status_terminality() {
        assert!(!ReviewStatus::Pending.is_terminal());
        assert!(ReviewStatus::Approved.is_terminal());
        assert!(ReviewStatus::Declined.is_terminal());
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&ReviewStatus::Declined).unwrap();
        assert_eq!(json, "\"declined\"");
        let parsed: ReviewStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(parsed, ReviewStatus::Pending);
    }

    #[test]
    fn test_stats_tally() {
        let make = |status| Submission {
            id: Uuid::now_v7(),
            provider_id: "chase".to_string(),
            provider_name: "JPMorgan Chase & Co.".to_string(),
            owner_id: "demo-user".to_string(),
            username: "a".to_string(),
            challenge_code: None,
            issued_code: None,
            connected_at: Utc::now(),
            review_status: status,
            reviewed_at: None,
            reviewed_by: None,
            review_notes: None,
            accounts: vec![],
        };
        let subs = vec![
            make(ReviewStatus::Pending),
            make(ReviewStatus::Pending),
            make(ReviewStatus::Approved),
        ];
        let stats = ReviewStats::tally(&subs);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.declined, 0);
        assert_eq!(stats.total(), 3);
    }
}
