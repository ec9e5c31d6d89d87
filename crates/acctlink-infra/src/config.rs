//! Configuration loader for the link service.
//!
//! Reads `config.toml` from the data directory (`~/.acctlink/` in production)
//! and deserializes it into [`LinkConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use acctlink_types::config::LinkConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "ACCTLINK_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `ACCTLINK_DATA_DIR` environment variable
/// 2. `~/.acctlink`
/// 3. `./.acctlink` when no home directory is known
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".acctlink");
    }

    PathBuf::from(".acctlink")
}

/// Load link configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`LinkConfig::default()`].
/// - If the file exists but fails to read or parse, logs a warning and
///   returns the default.
pub async fn load_link_config(data_dir: &Path) -> LinkConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return LinkConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return LinkConfig::default();
        }
    };

    match toml::from_str::<LinkConfig>(&content) {
        Ok(config) => {
            tracing::debug!(path = %config_path.display(), "Loaded link configuration");
            config
        }
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            LinkConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acctlink_types::config::ChallengeVerificationMode;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_link_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_link_config(tmp.path()).await;
        assert_eq!(config.session_ttl_secs, 1800);
        assert_eq!(config.challenge_verification, ChallengeVerificationMode::None);
    }

    #[tokio::test]
    async fn load_link_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
challenge_ttl_secs = 120
challenge_verification = "match-issued"
credential_rejection_rate = 0.3
reviewer_id = "ops"
"#,
        )
        .await
        .unwrap();

        let config = load_link_config(tmp.path()).await;
        assert_eq!(config.challenge_ttl_secs, 120);
        assert_eq!(
            config.challenge_verification,
            ChallengeVerificationMode::MatchIssued
        );
        assert_eq!(config.credential_rejection_rate, 0.3);
        assert_eq!(config.reviewer_id, "ops");
        assert_eq!(config.session_ttl_secs, 1800);
    }

    #[tokio::test]
    async fn load_link_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_link_config(tmp.path()).await;
        assert_eq!(config.session_ttl_secs, 1800);
        assert!(config.allow_fallback);
    }

    #[tokio::test]
    async fn load_link_config_wrong_types_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "session_ttl_secs = \"soon\"")
            .await
            .unwrap();

        let config = load_link_config(tmp.path()).await;
        assert_eq!(config.session_ttl_secs, 1800);
    }
}
