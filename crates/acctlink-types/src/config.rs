//! Service configuration types.
//!
//! `LinkConfig` represents the top-level `config.toml` that controls session
//! lifetimes, challenge handling, demo policies, and storage fallback.

use serde::{Deserialize, Serialize};

/// How a submitted challenge code is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengeVerificationMode {
    /// Accept any well-formed code and record it for human review.
    #[default]
    None,
    /// Require the code to equal the session's active issued code.
    MatchIssued,
}

/// Top-level configuration for the link service.
///
/// Loaded from `~/.acctlink/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Lifetime of a link session from creation.
    pub session_ttl_secs: u64,

    /// Lifetime of an issued challenge code.
    pub challenge_ttl_secs: u64,

    pub challenge_verification: ChallengeVerificationMode,

    /// Probability in `[0, 1]` that a credential submission is rejected.
    /// `0.0` accepts everything.
    pub credential_rejection_rate: f64,

    /// Insert per-operation delays that mimic a slow provider.
    pub simulate_latency: bool,

    /// Route to the process-local store when the persistent store is down.
    pub allow_fallback: bool,

    /// Owner recorded on sessions until real user accounts exist.
    pub default_owner_id: String,

    /// Operator identity stamped on review decisions.
    pub reviewer_id: String,

    /// Upper bound on a single persistent-store health probe.
    pub health_check_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 30 * 60,
            challenge_ttl_secs: 5 * 60,
            challenge_verification: ChallengeVerificationMode::None,
            credential_rejection_rate: 0.0,
            simulate_latency: false,
            allow_fallback: true,
            default_owner_id: "demo-user".to_string(),
            reviewer_id: "admin".to_string(),
            health_check_timeout_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_config_default_values() {
        let config = LinkConfig::default();
        assert_eq!(config.session_ttl_secs, 1800);
        assert_eq!(config.challenge_ttl_secs, 300);
        assert_eq!(config.challenge_verification, ChallengeVerificationMode::None);
        assert_eq!(config.credential_rejection_rate, 0.0);
        assert!(config.allow_fallback);
        assert_eq!(config.reviewer_id, "admin");
    }

    #[test]
    fn test_link_config_deserialize_with_defaults() {
        let config: LinkConfig = toml::from_str("").unwrap();
        assert_eq!(config.session_ttl_secs, 1800);
        assert!(!config.simulate_latency);
    }

    #[test]
    fn test_link_config_deserialize_with_values() {
        let toml_str = r#"
session_ttl_secs = 600
challenge_verification = "match-issued"
credential_rejection_rate = 0.3
simulate_latency = true
allow_fallback = false
reviewer_id = "ops-desk"
"#;
        let config: LinkConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.session_ttl_secs, 600);
        assert_eq!(config.challenge_ttl_secs, 300);
        assert_eq!(
            config.challenge_verification,
            ChallengeVerificationMode::MatchIssued
        );
        assert_eq!(config.credential_rejection_rate, 0.3);
        assert!(config.simulate_latency);
        assert!(!config.allow_fallback);
        assert_eq!(config.reviewer_id, "ops-desk");
    }

    #[test]
    fn test_unknown_verification_mode_rejected() {
        let result = toml::from_str::<LinkConfig>(r#"challenge_verification = "fuzzy""#);
        assert!(result.is_err());
    }
}
