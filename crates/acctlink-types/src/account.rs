use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A candidate account surfaced once a session clears its challenge stage.
///
/// Derived deterministically from the provider id; never persisted until
/// selected. `balance` serializes as decimal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub id: String,
    pub account_type: String,
    pub masked_number: String,
    pub balance: Decimal,
}

/// A selected account persisted under a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccount {
    pub id: Uuid,
    pub connection_id: Uuid,
    pub account_type: String,
    pub masked_number: String,
    /// Exact decimal text, never a float.
    pub balance: String,
    pub is_active: bool,
}

impl LinkedAccount {
    pub fn from_snapshot(connection_id: Uuid, snapshot: &AccountSnapshot) -> Self {
        Self {
            id: Uuid::now_v7(),
            connection_id,
            account_type: snapshot.account_type.clone(),
            masked_number: snapshot.masked_number.clone(),
            balance: snapshot.balance.to_string(),
            is_active: true,
        }
    }
}
