use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::SessionToken;

/// Fixed length of a challenge code.
pub const CHALLENGE_CODE_LEN: usize = 6;

/// Masked delivery destination shown to the user and the reviewer.
pub const DEFAULT_CHALLENGE_DESTINATION: &str = "***-**-1234";

/// The one-time-code artifact issued for a session.
///
/// A newer record for the same token supersedes older ones; only the newest
/// unexpired, unverified record is ever considered active.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRecord {
    pub id: Uuid,
    pub token: SessionToken,
    pub code: String,
    pub destination: String,
    pub issued_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub is_verified: bool,
    pub attempts: u32,
    pub expires_at: DateTime<Utc>,
}

impl ChallengeRecord {
    /// Unexpired and not yet verified.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_verified && now < self.expires_at
    }
}

/// Whether `code` has the shape of a challenge code: six ASCII digits.
pub fn is_well_formed_code(code: &str) -> bool {
    code.len() == CHALLENGE_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_well_formed_codes() {
        assert!(is_well_formed_code("123456"));
        assert!(is_well_formed_code("000000"));
    }

    #[test]
    fn test_malformed_codes() {
        assert!(!is_well_formed_code("12345"));
        assert!(!is_well_formed_code("1234567"));
        assert!(!is_well_formed_code("12a456"));
        assert!(!is_well_formed_code(""));
        // Non-ASCII digits are six chars but not six bytes.
        assert!(!is_well_formed_code("١٢٣٤٥٦"));
    }

    #[test]
    fn test_record_activity() {
        let now = Utc::now();
        let mut record = ChallengeRecord {
            id: Uuid::now_v7(),
            token: SessionToken::new("lk_test"),
            code: "654321".to_string(),
            destination: DEFAULT_CHALLENGE_DESTINATION.to_string(),
            issued_at: now,
            submitted_at: None,
            is_verified: false,
            attempts: 0,
            expires_at: now + Duration::minutes(5),
        };
        assert!(record.is_active(now));
        assert!(!record.is_active(now + Duration::minutes(5)));

        record.is_verified = true;
        assert!(!record.is_active(now));
    }
}
