use serde::{Deserialize, Serialize};

/// An institution a user can link.
///
/// Immutable reference data: seeded once into each store and read-only to
/// the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Stable lowercase key (e.g., "chase"). Unique.
    pub id: String,
    pub display_name: String,
    /// Whether a one-time challenge code is collected after login.
    pub requires_challenge: bool,
    /// Whether login demands a security answer alongside the password.
    pub requires_security_answer: bool,
    pub is_active: bool,
}

impl ProviderConfig {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        requires_challenge: bool,
        requires_security_answer: bool,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            requires_challenge,
            requires_security_answer,
            is_active: true,
        }
    }
}
