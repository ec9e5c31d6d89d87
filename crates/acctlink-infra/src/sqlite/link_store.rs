//! SQLite link store implementation.
//!
//! Implements `LinkStore` from `acctlink-core` using sqlx with split
//! read/write pools. Conditional transitions (collect, finalize, decide) are
//! single guarded `UPDATE` statements whose `rows_affected` decides the
//! outcome, so concurrent callers cannot both win.

use std::collections::HashMap;

use acctlink_core::repository::link_store::LinkStore;
use acctlink_types::account::LinkedAccount;
use acctlink_types::challenge::ChallengeRecord;
use acctlink_types::error::RepositoryError;
use acctlink_types::provider::ProviderConfig;
use acctlink_types::secret::{Credentials, Redacted};
use acctlink_types::session::{LinkSession, LinkStage, SessionToken};
use acctlink_types::submission::{ReviewDecision, ReviewOutcome, ReviewStatus, Submission};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `LinkStore`.
pub struct SqliteLinkStore {
    pool: DatabasePool,
}

impl SqliteLinkStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn accounts_for(&self, connection_id: &Uuid) -> Result<Vec<LinkedAccount>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM linked_accounts WHERE connection_id = ? ORDER BY position",
        )
        .bind(connection_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter().map(account_from_row).collect()
    }
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width UTC form so that text comparison in SQL orders correctly.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid uuid: {e}")))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn provider_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ProviderConfig, RepositoryError> {
    Ok(ProviderConfig {
        id: row.try_get("id").map_err(query_err)?,
        display_name: row.try_get("display_name").map_err(query_err)?,
        requires_challenge: row.try_get("requires_challenge").map_err(query_err)?,
        requires_security_answer: row.try_get("requires_security_answer").map_err(query_err)?,
        is_active: row.try_get("is_active").map_err(query_err)?,
    })
}

/// Internal row type for mapping SQLite rows to a domain `LinkSession`.
struct SessionRow {
    token: String,
    provider_id: String,
    owner_id: String,
    username: String,
    password: String,
    security_answer: Option<String>,
    stage: String,
    collected_code: Option<String>,
    is_active: bool,
    created_at: String,
    expires_at: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            token: row.try_get("token")?,
            provider_id: row.try_get("provider_id")?,
            owner_id: row.try_get("owner_id")?,
            username: row.try_get("username")?,
            password: row.try_get("password")?,
            security_answer: row.try_get("security_answer")?,
            stage: row.try_get("stage")?,
            collected_code: row.try_get("collected_code")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }

    fn into_session(self) -> Result<LinkSession, RepositoryError> {
        let stage: LinkStage = self.stage.parse().map_err(RepositoryError::Query)?;
        Ok(LinkSession {
            token: SessionToken::new(self.token),
            provider_id: self.provider_id,
            owner_id: self.owner_id,
            credentials: Credentials {
                username: self.username,
                password: Redacted::new(self.password),
                security_answer: self.security_answer.map(Redacted::new),
            },
            stage,
            collected_code: self.collected_code,
            is_active: self.is_active,
            created_at: parse_datetime(&self.created_at)?,
            expires_at: parse_datetime(&self.expires_at)?,
        })
    }
}

fn challenge_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ChallengeRecord, RepositoryError> {
    let id: String = row.try_get("id").map_err(query_err)?;
    let token: String = row.try_get("token").map_err(query_err)?;
    let issued_at: String = row.try_get("issued_at").map_err(query_err)?;
    let submitted_at: Option<String> = row.try_get("submitted_at").map_err(query_err)?;
    let expires_at: String = row.try_get("expires_at").map_err(query_err)?;
    let attempts: i64 = row.try_get("attempts").map_err(query_err)?;

    Ok(ChallengeRecord {
        id: parse_uuid(&id)?,
        token: SessionToken::new(token),
        code: row.try_get("code").map_err(query_err)?,
        destination: row.try_get("destination").map_err(query_err)?,
        issued_at: parse_datetime(&issued_at)?,
        submitted_at: submitted_at.as_deref().map(parse_datetime).transpose()?,
        is_verified: row.try_get("is_verified").map_err(query_err)?,
        attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        expires_at: parse_datetime(&expires_at)?,
    })
}

fn account_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<LinkedAccount, RepositoryError> {
    let id: String = row.try_get("id").map_err(query_err)?;
    let connection_id: String = row.try_get("connection_id").map_err(query_err)?;
    Ok(LinkedAccount {
        id: parse_uuid(&id)?,
        connection_id: parse_uuid(&connection_id)?,
        account_type: row.try_get("account_type").map_err(query_err)?,
        masked_number: row.try_get("masked_number").map_err(query_err)?,
        balance: row.try_get("balance").map_err(query_err)?,
        is_active: row.try_get("is_active").map_err(query_err)?,
    })
}

/// Build a submission from its row; accounts are attached by the caller.
fn submission_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Submission, RepositoryError> {
    let id: String = row.try_get("id").map_err(query_err)?;
    let connected_at: String = row.try_get("connected_at").map_err(query_err)?;
    let review_status: String = row.try_get("review_status").map_err(query_err)?;
    let reviewed_at: Option<String> = row.try_get("reviewed_at").map_err(query_err)?;

    Ok(Submission {
        id: parse_uuid(&id)?,
        provider_id: row.try_get("provider_id").map_err(query_err)?,
        provider_name: row.try_get("provider_name").map_err(query_err)?,
        owner_id: row.try_get("owner_id").map_err(query_err)?,
        username: row.try_get("username").map_err(query_err)?,
        challenge_code: row.try_get("challenge_code").map_err(query_err)?,
        issued_code: row.try_get("issued_code").map_err(query_err)?,
        connected_at: parse_datetime(&connected_at)?,
        review_status: review_status.parse().map_err(RepositoryError::Query)?,
        reviewed_at: reviewed_at.as_deref().map(parse_datetime).transpose()?,
        reviewed_by: row.try_get("reviewed_by").map_err(query_err)?,
        review_notes: row.try_get("review_notes").map_err(query_err)?,
        accounts: Vec::new(),
    })
}

impl LinkStore for SqliteLinkStore {
    async fn count_providers(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM provider_configs")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_err)?;
        Ok(count as u64)
    }

    async fn insert_providers(&self, providers: &[ProviderConfig]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        for provider in providers {
            sqlx::query(
                "INSERT OR IGNORE INTO provider_configs
                     (id, position, display_name, requires_challenge, requires_security_answer, is_active)
                 VALUES (?, (SELECT COALESCE(MAX(position), -1) + 1 FROM provider_configs), ?, ?, ?, ?)",
            )
            .bind(&provider.id)
            .bind(&provider.display_name)
            .bind(provider.requires_challenge)
            .bind(provider.requires_security_answer)
            .bind(provider.is_active)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        }

        tx.commit().await.map_err(query_err)?;
        Ok(())
    }

    async fn list_providers(&self) -> Result<Vec<ProviderConfig>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM provider_configs ORDER BY position")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        rows.iter().map(provider_from_row).collect()
    }

    async fn get_provider(&self, id: &str) -> Result<Option<ProviderConfig>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM provider_configs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        row.as_ref().map(provider_from_row).transpose()
    }

    async fn create_session(
        &self,
        session: &LinkSession,
        challenge: Option<&ChallengeRecord>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        sqlx::query(
            "INSERT INTO link_sessions
                 (token, provider_id, owner_id, username, password, security_answer, stage,
                  collected_code, is_active, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(session.token.as_str())
        .bind(&session.provider_id)
        .bind(&session.owner_id)
        .bind(&session.credentials.username)
        .bind(session.credentials.password.expose())
        .bind(session.credentials.security_answer.as_ref().map(|a| a.expose()))
        .bind(session.stage.as_str())
        .bind(&session.collected_code)
        .bind(session.is_active)
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.expires_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.message().contains("UNIQUE") {
                    return RepositoryError::Conflict(format!(
                        "session token {} already exists",
                        session.token.prefix()
                    ));
                }
            }
            RepositoryError::Query(e.to_string())
        })?;

        if let Some(record) = challenge {
            sqlx::query(
                "INSERT INTO challenge_records
                     (id, token, code, destination, issued_at, submitted_at, is_verified, attempts, expires_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(record.id.to_string())
            .bind(record.token.as_str())
            .bind(&record.code)
            .bind(&record.destination)
            .bind(format_datetime(&record.issued_at))
            .bind(record.submitted_at.as_ref().map(format_datetime))
            .bind(record.is_verified)
            .bind(i64::from(record.attempts))
            .bind(format_datetime(&record.expires_at))
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        }

        tx.commit().await.map_err(query_err)?;
        Ok(())
    }

    async fn get_session(
        &self,
        token: &SessionToken,
    ) -> Result<Option<LinkSession>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM link_sessions WHERE token = ?")
            .bind(token.as_str())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let session_row = SessionRow::from_row(&row).map_err(query_err)?;
                Ok(Some(session_row.into_session()?))
            }
            None => Ok(None),
        }
    }

    async fn collect_challenge_code(
        &self,
        token: &SessionToken,
        code: &str,
        challenge_id: Option<&Uuid>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let sql = format!(
            "UPDATE link_sessions SET collected_code = ?, stage = ?
             WHERE token = ? AND is_active = 1 AND expires_at > ? AND stage IN ({})",
            placeholders(LinkStage::CHALLENGE_OPEN.len())
        );
        let mut query = sqlx::query(&sql)
            .bind(code)
            .bind(LinkStage::ChallengeCollected.as_str())
            .bind(token.as_str())
            .bind(format_datetime(&now));
        for stage in LinkStage::CHALLENGE_OPEN {
            query = query.bind(stage.as_str());
        }
        let result = query.execute(&mut *tx).await.map_err(query_err)?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        if let Some(challenge_id) = challenge_id {
            let result = sqlx::query(
                "UPDATE challenge_records
                 SET attempts = attempts + 1, submitted_at = ?, is_verified = 1
                 WHERE id = ? AND token = ?",
            )
            .bind(format_datetime(&now))
            .bind(challenge_id.to_string())
            .bind(token.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
            if result.rows_affected() == 0 {
                // Rolls back the session update too.
                return Err(RepositoryError::NotFound);
            }
        }

        tx.commit().await.map_err(query_err)?;
        Ok(true)
    }

    async fn deactivate_session(&self, token: &SessionToken) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE link_sessions SET is_active = 0 WHERE token = ?")
            .bind(token.as_str())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn finalize_session(
        &self,
        token: &SessionToken,
        allowed_stages: &[LinkStage],
        now: DateTime<Utc>,
        submission: &Submission,
    ) -> Result<bool, RepositoryError> {
        if allowed_stages.is_empty() {
            return Ok(false);
        }

        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let sql = format!(
            "UPDATE link_sessions SET stage = ?
             WHERE token = ? AND is_active = 1 AND expires_at > ? AND stage IN ({})",
            placeholders(allowed_stages.len())
        );
        let mut query = sqlx::query(&sql)
            .bind(LinkStage::Finalized.as_str())
            .bind(token.as_str())
            .bind(format_datetime(&now));
        for stage in allowed_stages {
            query = query.bind(stage.as_str());
        }
        let result = query.execute(&mut *tx).await.map_err(query_err)?;
        if result.rows_affected() == 0 {
            // Dropping the transaction rolls it back.
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO submissions
                 (id, provider_id, provider_name, owner_id, username, challenge_code, issued_code,
                  connected_at, review_status, reviewed_at, reviewed_by, review_notes)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(submission.id.to_string())
        .bind(&submission.provider_id)
        .bind(&submission.provider_name)
        .bind(&submission.owner_id)
        .bind(&submission.username)
        .bind(&submission.challenge_code)
        .bind(&submission.issued_code)
        .bind(format_datetime(&submission.connected_at))
        .bind(submission.review_status.as_str())
        .bind(submission.reviewed_at.as_ref().map(format_datetime))
        .bind(&submission.reviewed_by)
        .bind(&submission.review_notes)
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        for (position, account) in submission.accounts.iter().enumerate() {
            sqlx::query(
                "INSERT INTO linked_accounts
                     (id, connection_id, position, account_type, masked_number, balance, is_active)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(account.id.to_string())
            .bind(account.connection_id.to_string())
            .bind(position as i64)
            .bind(&account.account_type)
            .bind(&account.masked_number)
            .bind(&account.balance)
            .bind(account.is_active)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        }

        tx.commit().await.map_err(query_err)?;
        Ok(true)
    }

    async fn latest_challenge(
        &self,
        token: &SessionToken,
    ) -> Result<Option<ChallengeRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM challenge_records WHERE token = ?
             ORDER BY issued_at DESC, id DESC LIMIT 1",
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_err)?;

        row.as_ref().map(challenge_from_row).transpose()
    }

    async fn record_challenge_attempt(
        &self,
        token: &SessionToken,
        challenge_id: &Uuid,
        verified: bool,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE challenge_records
             SET attempts = attempts + 1, submitted_at = ?, is_verified = ?
             WHERE id = ? AND token = ?",
        )
        .bind(format_datetime(&now))
        .bind(verified)
        .bind(challenge_id.to_string())
        .bind(token.as_str())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_active_challenges(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ChallengeRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT c.* FROM challenge_records c
             WHERE c.is_verified = 0 AND c.expires_at > ?
               AND NOT EXISTS (
                   SELECT 1 FROM challenge_records n
                   WHERE n.token = c.token
                     AND (n.issued_at > c.issued_at OR (n.issued_at = c.issued_at AND n.id > c.id))
               )
             ORDER BY c.issued_at DESC",
        )
        .bind(format_datetime(&now))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter().map(challenge_from_row).collect()
    }

    async fn list_submissions(&self) -> Result<Vec<Submission>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM submissions ORDER BY connected_at DESC, id DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;
        let mut submissions: Vec<Submission> =
            rows.iter().map(submission_from_row).collect::<Result<_, _>>()?;

        let account_rows =
            sqlx::query("SELECT * FROM linked_accounts ORDER BY connection_id, position")
                .fetch_all(&self.pool.reader)
                .await
                .map_err(query_err)?;
        let mut by_connection: HashMap<Uuid, Vec<LinkedAccount>> = HashMap::new();
        for row in &account_rows {
            let account = account_from_row(row)?;
            by_connection
                .entry(account.connection_id)
                .or_default()
                .push(account);
        }

        for submission in &mut submissions {
            submission.accounts = by_connection.remove(&submission.id).unwrap_or_default();
        }
        Ok(submissions)
    }

    async fn get_submission(&self, id: &Uuid) -> Result<Option<Submission>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM submissions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let mut submission = submission_from_row(&row)?;
                submission.accounts = self.accounts_for(id).await?;
                Ok(Some(submission))
            }
            None => Ok(None),
        }
    }

    async fn decide_submission(
        &self,
        id: &Uuid,
        decision: &ReviewDecision,
    ) -> Result<ReviewOutcome, RepositoryError> {
        let result = sqlx::query(
            "UPDATE submissions
             SET review_status = ?, reviewed_at = ?, reviewed_by = ?, review_notes = ?
             WHERE id = ? AND review_status = ?",
        )
        .bind(decision.action.resulting_status().as_str())
        .bind(format_datetime(&decision.reviewed_at))
        .bind(&decision.reviewed_by)
        .bind(&decision.notes)
        .bind(id.to_string())
        .bind(ReviewStatus::Pending.as_str())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() > 0 {
            return match self.get_submission(id).await? {
                Some(submission) => Ok(ReviewOutcome::Decided(submission)),
                None => Err(RepositoryError::NotFound),
            };
        }

        match self.get_submission(id).await? {
            Some(existing) => Ok(ReviewOutcome::AlreadyDecided(existing.review_status)),
            None => Ok(ReviewOutcome::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acctlink_types::account::AccountSnapshot;
    use acctlink_types::submission::ReviewAction;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::Arc;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    async fn test_store() -> SqliteLinkStore {
        SqliteLinkStore::new(test_pool().await)
    }

    fn make_session(token: &str, stage: LinkStage, now: DateTime<Utc>) -> LinkSession {
        LinkSession {
            token: SessionToken::new(token),
            provider_id: "chase".to_string(),
            owner_id: "demo-user".to_string(),
            credentials: Credentials::new("alice", "pw").with_security_answer("rex"),
            stage,
            collected_code: None,
            is_active: true,
            created_at: now,
            expires_at: now + Duration::minutes(30),
        }
    }

    fn make_challenge(token: &str, issued_at: DateTime<Utc>) -> ChallengeRecord {
        ChallengeRecord {
            id: Uuid::now_v7(),
            token: SessionToken::new(token),
            code: "482913".to_string(),
            destination: "***-**-1234".to_string(),
            issued_at,
            submitted_at: None,
            is_verified: false,
            attempts: 0,
            expires_at: issued_at + Duration::minutes(5),
        }
    }

    fn make_submission(connected_at: DateTime<Utc>) -> Submission {
        let id = Uuid::now_v7();
        let snapshots = [
            AccountSnapshot {
                id: "acc_1".to_string(),
                account_type: "Checking Account".to_string(),
                masked_number: "****-****-****-1234".to_string(),
                balance: Decimal::new(245075, 2),
            },
            AccountSnapshot {
                id: "acc_3".to_string(),
                account_type: "Credit Card".to_string(),
                masked_number: "****-****-****-9012".to_string(),
                balance: Decimal::new(-125030, 2),
            },
        ];
        Submission {
            id,
            provider_id: "chase".to_string(),
            provider_name: "JPMorgan Chase & Co.".to_string(),
            owner_id: "demo-user".to_string(),
            username: "alice".to_string(),
            challenge_code: Some("123456".to_string()),
            issued_code: Some("482913".to_string()),
            connected_at,
            review_status: ReviewStatus::Pending,
            reviewed_at: None,
            reviewed_by: None,
            review_notes: None,
            accounts: snapshots
                .iter()
                .map(|s| LinkedAccount::from_snapshot(id, s))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_providers_seed_order_and_ignore_duplicates() {
        let store = test_store().await;
        store
            .insert_providers(&[
                ProviderConfig::new("chase", "JPMorgan Chase & Co.", true, false),
                ProviderConfig::new("usbank", "U.S. Bank", false, false),
            ])
            .await
            .unwrap();
        store
            .insert_providers(&[
                ProviderConfig::new("usbank", "Renamed", true, true),
                ProviderConfig::new("bofa", "Bank of America", true, true),
            ])
            .await
            .unwrap();

        assert_eq!(store.count_providers().await.unwrap(), 3);
        let ids: Vec<String> = store
            .list_providers()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["chase", "usbank", "bofa"]);

        let usbank = store.get_provider("usbank").await.unwrap().unwrap();
        assert_eq!(usbank.display_name, "U.S. Bank");
        assert!(!usbank.requires_challenge);
        assert!(store.get_provider("nowhere").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_round_trip_with_challenge() {
        let store = test_store().await;
        let now = Utc::now();
        let session = make_session("lk_roundtrip", LinkStage::ChallengeIssued, now);
        let challenge = make_challenge("lk_roundtrip", now);

        store.create_session(&session, Some(&challenge)).await.unwrap();

        let loaded = store.get_session(&session.token).await.unwrap().unwrap();
        assert_eq!(loaded.stage, LinkStage::ChallengeIssued);
        assert_eq!(loaded.credentials.username, "alice");
        assert_eq!(loaded.credentials.password.expose(), "pw");
        assert!(loaded.credentials.has_security_answer());
        assert_eq!(loaded.expires_at, session.expires_at);

        let latest = store.latest_challenge(&session.token).await.unwrap().unwrap();
        assert_eq!(latest.id, challenge.id);
        assert_eq!(latest.code, "482913");
    }

    #[tokio::test]
    async fn test_duplicate_token_conflicts() {
        let store = test_store().await;
        let session = make_session("lk_dup", LinkStage::Authenticated, Utc::now());
        store.create_session(&session, None).await.unwrap();
        let err = store.create_session(&session, None).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_collect_is_gated_by_stage_and_expiry() {
        let store = test_store().await;
        let now = Utc::now();
        let open = make_session("lk_open", LinkStage::ChallengeIssued, now);
        let done = make_session("lk_done", LinkStage::Finalized, now);
        store.create_session(&open, None).await.unwrap();
        store.create_session(&done, None).await.unwrap();

        assert!(!store.collect_challenge_code(&done.token, "111111", None, now).await.unwrap());
        assert!(
            !store
                .collect_challenge_code(&open.token, "111111", None, now + Duration::minutes(30))
                .await
                .unwrap()
        );
        assert!(store.collect_challenge_code(&open.token, "111111", None, now).await.unwrap());
        assert!(store.collect_challenge_code(&open.token, "222222", None, now).await.unwrap());

        let loaded = store.get_session(&open.token).await.unwrap().unwrap();
        assert_eq!(loaded.stage, LinkStage::ChallengeCollected);
        assert_eq!(loaded.collected_code.as_deref(), Some("222222"));
    }

    #[tokio::test]
    async fn test_deactivated_session_cannot_collect() {
        let store = test_store().await;
        let now = Utc::now();
        let session = make_session("lk_cancel", LinkStage::Authenticated, now);
        store.create_session(&session, None).await.unwrap();

        assert!(store.deactivate_session(&session.token).await.unwrap());
        assert!(!store.collect_challenge_code(&session.token, "123456", None, now).await.unwrap());
        assert!(!store.deactivate_session(&SessionToken::new("lk_missing")).await.unwrap());
    }

    #[tokio::test]
    async fn test_finalize_persists_submission_once() {
        let store = test_store().await;
        let now = Utc::now();
        let session = make_session("lk_final", LinkStage::ChallengeCollected, now);
        store.create_session(&session, None).await.unwrap();

        let submission = make_submission(now);
        let allowed = [LinkStage::ChallengeCollected];
        assert!(store.finalize_session(&session.token, &allowed, now, &submission).await.unwrap());

        let again = make_submission(now);
        assert!(!store.finalize_session(&session.token, &allowed, now, &again).await.unwrap());

        let loaded = store.get_submission(&submission.id).await.unwrap().unwrap();
        assert_eq!(loaded.accounts.len(), 2);
        assert_eq!(loaded.accounts[0].account_type, "Checking Account");
        assert_eq!(
            Decimal::from_str(&loaded.accounts[1].balance).unwrap(),
            Decimal::new(-125030, 2)
        );
        assert!(store.get_submission(&again.id).await.unwrap().is_none());
        assert_eq!(
            store.get_session(&session.token).await.unwrap().unwrap().stage,
            LinkStage::Finalized
        );
    }

    #[tokio::test]
    async fn test_finalize_writes_nothing_for_wrong_stage() {
        let store = test_store().await;
        let now = Utc::now();
        let session = make_session("lk_early", LinkStage::ChallengeIssued, now);
        store.create_session(&session, None).await.unwrap();

        let submission = make_submission(now);
        assert!(
            !store
                .finalize_session(&session.token, &[LinkStage::ChallengeCollected], now, &submission)
                .await
                .unwrap()
        );
        assert!(store.list_submissions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_challenge_attempts_and_active_listing() {
        let store = test_store().await;
        let now = Utc::now();
        let a = make_session("lk_a", LinkStage::ChallengeIssued, now);
        let b = make_session("lk_b", LinkStage::ChallengeIssued, now);
        let first = make_challenge("lk_a", now);
        store.create_session(&a, Some(&first)).await.unwrap();
        store
            .create_session(&b, Some(&make_challenge("lk_b", now + Duration::seconds(1))))
            .await
            .unwrap();

        let active = store.list_active_challenges(now).await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].token.as_str(), "lk_b");

        store.record_challenge_attempt(&a.token, &first.id, true, now).await.unwrap();
        let record = store.latest_challenge(&a.token).await.unwrap().unwrap();
        assert_eq!(record.attempts, 1);
        assert!(record.is_verified);
        assert!(record.submitted_at.is_some());

        let active = store.list_active_challenges(now).await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(store
            .list_active_challenges(now + Duration::minutes(6))
            .await
            .unwrap()
            .is_empty());

        let err = store
            .record_challenge_attempt(&a.token, &Uuid::now_v7(), true, now)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
        let err = store
            .record_challenge_attempt(&b.token, &first.id, false, now)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_collect_counts_verified_attempt_in_same_transaction() {
        let store = test_store().await;
        let now = Utc::now();
        let session = make_session("lk_tx", LinkStage::ChallengeIssued, now);
        let challenge = make_challenge("lk_tx", now);
        store.create_session(&session, Some(&challenge)).await.unwrap();

        assert!(store
            .collect_challenge_code(&session.token, "482913", Some(&challenge.id), now)
            .await
            .unwrap());
        let record = store.latest_challenge(&session.token).await.unwrap().unwrap();
        assert_eq!(record.attempts, 1);
        assert!(record.is_verified);

        // Unknown challenge: the session update is rolled back with it.
        let other = make_session("lk_tx_other", LinkStage::ChallengeIssued, now);
        store.create_session(&other, None).await.unwrap();
        let err = store
            .collect_challenge_code(&other.token, "482913", Some(&challenge.id), now)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
        let loaded = store.get_session(&other.token).await.unwrap().unwrap();
        assert_eq!(loaded.stage, LinkStage::ChallengeIssued);
        assert!(loaded.collected_code.is_none());
        assert_eq!(
            store.latest_challenge(&session.token).await.unwrap().unwrap().attempts,
            1
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_collects_on_one_session() {
        const SUBMITS: usize = 16;
        let store = Arc::new(test_store().await);
        let now = Utc::now();
        let session = make_session("lk_race", LinkStage::ChallengeIssued, now);
        let challenge = make_challenge("lk_race", now);
        store.create_session(&session, Some(&challenge)).await.unwrap();

        let codes: Vec<String> = (0..SUBMITS).map(|i| format!("{:06}", 100000 + i)).collect();
        let handles: Vec<_> = codes
            .iter()
            .cloned()
            .map(|code| {
                let store = Arc::clone(&store);
                let token = session.token.clone();
                let challenge_id = challenge.id;
                tokio::spawn(async move {
                    store
                        .collect_challenge_code(&token, &code, Some(&challenge_id), now)
                        .await
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap());
        }

        let loaded = store.get_session(&session.token).await.unwrap().unwrap();
        assert_eq!(loaded.stage, LinkStage::ChallengeCollected);
        let collected = loaded.collected_code.unwrap();
        assert!(codes.contains(&collected), "unexpected code {collected}");
        let record = store.latest_challenge(&session.token).await.unwrap().unwrap();
        assert_eq!(record.attempts as usize, SUBMITS);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_decides_apply_once() {
        let store = Arc::new(test_store().await);
        let now = Utc::now();
        let session = make_session("lk_race_review", LinkStage::ChallengeCollected, now);
        store.create_session(&session, None).await.unwrap();
        let submission = make_submission(now);
        store
            .finalize_session(&session.token, &[LinkStage::ChallengeCollected], now, &submission)
            .await
            .unwrap();

        let handles: Vec<_> = [ReviewAction::Approve, ReviewAction::Decline]
            .into_iter()
            .map(|action| {
                let store = Arc::clone(&store);
                let id = submission.id;
                let decision = ReviewDecision {
                    action,
                    reviewed_by: "admin".to_string(),
                    reviewed_at: now,
                    notes: None,
                };
                tokio::spawn(async move { store.decide_submission(&id, &decision).await })
            })
            .collect();
        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap().unwrap());
        }

        let decided: Vec<ReviewStatus> = outcomes
            .iter()
            .filter_map(|o| match o {
                ReviewOutcome::Decided(s) => Some(s.review_status),
                _ => None,
            })
            .collect();
        assert_eq!(decided.len(), 1);
        assert!(outcomes
            .iter()
            .any(|o| matches!(o, ReviewOutcome::AlreadyDecided(status) if *status == decided[0])));
        let stored = store.get_submission(&submission.id).await.unwrap().unwrap();
        assert_eq!(stored.review_status, decided[0]);
    }

    #[tokio::test]
    async fn test_submissions_newest_first_with_accounts() {
        let store = test_store().await;
        let now = Utc::now();
        for (i, token) in ["lk_s1", "lk_s2"].iter().enumerate() {
            let at = now + Duration::seconds(i as i64);
            store
                .create_session(&make_session(token, LinkStage::ChallengeCollected, at), None)
                .await
                .unwrap();
            store
                .finalize_session(
                    &SessionToken::new(*token),
                    &[LinkStage::ChallengeCollected],
                    at,
                    &make_submission(at),
                )
                .await
                .unwrap();
        }

        let all = store.list_submissions().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].connected_at > all[1].connected_at);
        assert!(all.iter().all(|s| s.accounts.len() == 2));
        assert!(all.iter().all(|s| s.accounts.iter().all(|a| a.connection_id == s.id)));
    }

    #[tokio::test]
    async fn test_decide_applies_exactly_once() {
        let store = test_store().await;
        let now = Utc::now();
        let session = make_session("lk_review", LinkStage::ChallengeCollected, now);
        store.create_session(&session, None).await.unwrap();
        let submission = make_submission(now);
        store
            .finalize_session(&session.token, &[LinkStage::ChallengeCollected], now, &submission)
            .await
            .unwrap();

        let approve = ReviewDecision {
            action: ReviewAction::Approve,
            reviewed_by: "admin".to_string(),
            reviewed_at: now,
            notes: Some("looks fine".to_string()),
        };
        match store.decide_submission(&submission.id, &approve).await.unwrap() {
            ReviewOutcome::Decided(decided) => {
                assert_eq!(decided.review_status, ReviewStatus::Approved);
                assert_eq!(decided.reviewed_by.as_deref(), Some("admin"));
                assert_eq!(decided.review_notes.as_deref(), Some("looks fine"));
                assert!(decided.reviewed_at.is_some());
            }
            other => panic!("expected Decided, got {other:?}"),
        }

        let decline = ReviewDecision {
            action: ReviewAction::Decline,
            ..approve.clone()
        };
        assert!(matches!(
            store.decide_submission(&submission.id, &decline).await.unwrap(),
            ReviewOutcome::AlreadyDecided(ReviewStatus::Approved)
        ));
        assert!(matches!(
            store.decide_submission(&Uuid::now_v7(), &decline).await.unwrap(),
            ReviewOutcome::NotFound
        ));
    }
}
