//! Provider reference data and deterministic account snapshots.

use acctlink_types::account::AccountSnapshot;
use acctlink_types::provider::ProviderConfig;
use rust_decimal::Decimal;

/// Providers that surface an extra credit line account.
const CREDIT_LINE_PROVIDERS: [&str; 2] = ["chase", "bofa"];

/// The seeded provider catalog, in display order.
pub fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new("chase", "JPMorgan Chase & Co.", true, false),
        ProviderConfig::new("bofa", "Bank of America", true, true),
        ProviderConfig::new("citi", "Citibank (Citigroup)", true, false),
        ProviderConfig::new("wells", "Wells Fargo", true, true),
        ProviderConfig::new("usbank", "U.S. Bank", false, false),
        ProviderConfig::new("pnc", "PNC Bank", true, false),
        ProviderConfig::new("truist", "Truist Financial", true, false),
        ProviderConfig::new("capital", "Capital One", true, false),
        ProviderConfig::new("hsbc", "HSBC Bank USA", true, true),
        ProviderConfig::new("amex", "American Express Bank", true, false),
        ProviderConfig::new("paypal", "PayPal", true, false),
    ]
}

/// Candidate accounts for a provider.
///
/// Pure function of `provider_id`: the same provider always yields the same
/// set in the same order.
pub fn account_snapshots(provider_id: &str) -> Vec<AccountSnapshot> {
    let mut accounts = vec![
        snapshot("acc_1", "Checking Account", "****-****-****-1234", Decimal::new(245075, 2)),
        snapshot("acc_2", "Savings Account", "****-****-****-5678", Decimal::new(1583220, 2)),
    ];
    if CREDIT_LINE_PROVIDERS.contains(&provider_id) {
        accounts.push(snapshot(
            "acc_3",
            "Credit Card",
            "****-****-****-9012",
            Decimal::new(-125030, 2),
        ));
    }
    accounts
}

fn snapshot(id: &str, account_type: &str, masked_number: &str, balance: Decimal) -> AccountSnapshot {
    AccountSnapshot {
        id: id.to_string(),
        account_type: account_type.to_string(),
        masked_number: masked_number.to_string(),
        balance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_has_eleven_unique_providers() {
        let providers = default_providers();
        assert_eq!(providers.len(), 11);
        let ids: HashSet<_> = providers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), 11);
        assert!(providers.iter().all(|p| p.is_active));
    }

    #[test]
    fn test_only_usbank_skips_challenge() {
        let skipping: Vec<_> = default_providers()
            .into_iter()
            .filter(|p| !p.requires_challenge)
            .map(|p| p.id)
            .collect();
        assert_eq!(skipping, vec!["usbank"]);
    }

    #[test]
    fn test_security_answer_providers() {
        let mut demanding: Vec<_> = default_providers()
            .into_iter()
            .filter(|p| p.requires_security_answer)
            .map(|p| p.id)
            .collect();
        demanding.sort();
        assert_eq!(demanding, vec!["bofa", "hsbc", "wells"]);
    }

    #[test]
    fn test_credit_line_only_for_chase_and_bofa() {
        assert_eq!(account_snapshots("chase").len(), 3);
        assert_eq!(account_snapshots("bofa").len(), 3);
        assert_eq!(account_snapshots("usbank").len(), 2);
        assert_eq!(account_snapshots("unknown").len(), 2);
    }

    #[test]
    fn test_snapshots_are_deterministic() {
        assert_eq!(account_snapshots("chase"), account_snapshots("chase"));
        let chase = account_snapshots("chase");
        assert_eq!(chase[2].balance.to_string(), "-1250.30");
        assert_eq!(chase[1].balance.to_string(), "15832.20");
    }
}
