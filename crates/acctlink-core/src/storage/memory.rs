//! Process-local, non-durable `LinkStore`.
//!
//! Serves as the fallback store whenever the persistent store is unreachable,
//! and as the in-memory double in tests. Backed by `DashMap`; every
//! conditional mutation happens while holding the entry's shard lock, so
//! concurrent callers on the same token cannot interleave inside an update.
//! Values are cloned on read -- never hold a `DashMap` guard across await.

use std::sync::atomic::{AtomicUsize, Ordering};

use acctlink_types::challenge::ChallengeRecord;
use acctlink_types::error::RepositoryError;
use acctlink_types::provider::ProviderConfig;
use acctlink_types::session::{LinkSession, LinkStage, SessionToken};
use acctlink_types::submission::{ReviewDecision, ReviewOutcome, ReviewStatus, Submission};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::repository::link_store::LinkStore;

/// In-memory implementation of [`LinkStore`].
#[derive(Default)]
pub struct MemoryLinkStore {
    /// provider id -> (seed position, config)
    providers: DashMap<String, (usize, ProviderConfig)>,
    next_provider_seq: AtomicUsize,
    sessions: DashMap<SessionToken, LinkSession>,
    /// token -> records, oldest first
    challenges: DashMap<SessionToken, Vec<ChallengeRecord>>,
    submissions: DashMap<Uuid, Submission>,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LinkStore for MemoryLinkStore {
    async fn count_providers(&self) -> Result<u64, RepositoryError> {
        Ok(self.providers.len() as u64)
    }

    async fn insert_providers(&self, providers: &[ProviderConfig]) -> Result<(), RepositoryError> {
        for provider in providers {
            self.providers.entry(provider.id.clone()).or_insert_with(|| {
                let seq = self.next_provider_seq.fetch_add(1, Ordering::Relaxed);
                (seq, provider.clone())
            });
        }
        Ok(())
    }

    async fn list_providers(&self) -> Result<Vec<ProviderConfig>, RepositoryError> {
        let mut entries: Vec<(usize, ProviderConfig)> = self
            .providers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        Ok(entries.into_iter().map(|(_, provider)| provider).collect())
    }

    async fn get_provider(&self, id: &str) -> Result<Option<ProviderConfig>, RepositoryError> {
        Ok(self.providers.get(id).map(|entry| entry.value().1.clone()))
    }

    async fn create_session(
        &self,
        session: &LinkSession,
        challenge: Option<&ChallengeRecord>,
    ) -> Result<(), RepositoryError> {
        match self.sessions.entry(session.token.clone()) {
            Entry::Occupied(_) => {
                return Err(RepositoryError::Conflict(format!(
                    "session token {} already exists",
                    session.token.prefix()
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
            }
        }

        if let Some(record) = challenge {
            self.challenges
                .entry(record.token.clone())
                .or_default()
                .push(record.clone());
        }
        Ok(())
    }

    async fn get_session(
        &self,
        token: &SessionToken,
    ) -> Result<Option<LinkSession>, RepositoryError> {
        Ok(self.sessions.get(token).map(|entry| entry.value().clone()))
    }

    async fn collect_challenge_code(
        &self,
        token: &SessionToken,
        code: &str,
        challenge_id: Option<&Uuid>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let Some(mut session) = self.sessions.get_mut(token) else {
            return Ok(false);
        };
        if !session.is_live(now) || !LinkStage::CHALLENGE_OPEN.contains(&session.stage) {
            return Ok(false);
        }
        // Challenges live in a separate map; taking its guard while the
        // session guard is held cannot deadlock.
        if let Some(challenge_id) = challenge_id {
            let mut records = self
                .challenges
                .get_mut(token)
                .ok_or(RepositoryError::NotFound)?;
            let record = records
                .iter_mut()
                .find(|r| r.id == *challenge_id)
                .ok_or(RepositoryError::NotFound)?;
            if session.advance(LinkStage::ChallengeCollected).is_err() {
                return Ok(false);
            }
            record.attempts += 1;
            record.submitted_at = Some(now);
            record.is_verified = true;
        } else if session.advance(LinkStage::ChallengeCollected).is_err() {
            return Ok(false);
        }
        session.collected_code = Some(code.to_string());
        Ok(true)
    }

    async fn deactivate_session(&self, token: &SessionToken) -> Result<bool, RepositoryError> {
        match self.sessions.get_mut(token) {
            Some(mut session) => {
                session.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn finalize_session(
        &self,
        token: &SessionToken,
        allowed_stages: &[LinkStage],
        now: DateTime<Utc>,
        submission: &Submission,
    ) -> Result<bool, RepositoryError> {
        let Some(mut session) = self.sessions.get_mut(token) else {
            return Ok(false);
        };
        if !session.is_live(now) || !allowed_stages.contains(&session.stage) {
            return Ok(false);
        }
        if session.advance(LinkStage::Finalized).is_err() {
            return Ok(false);
        }
        // Submission map is a different DashMap, so inserting while the
        // session guard is held cannot deadlock.
        self.submissions.insert(submission.id, submission.clone());
        Ok(true)
    }

    async fn latest_challenge(
        &self,
        token: &SessionToken,
    ) -> Result<Option<ChallengeRecord>, RepositoryError> {
        Ok(self
            .challenges
            .get(token)
            .and_then(|records| records.last().cloned()))
    }

    async fn record_challenge_attempt(
        &self,
        token: &SessionToken,
        challenge_id: &Uuid,
        verified: bool,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut records = self
            .challenges
            .get_mut(token)
            .ok_or(RepositoryError::NotFound)?;
        let record = records
            .iter_mut()
            .find(|r| r.id == *challenge_id)
            .ok_or(RepositoryError::NotFound)?;
        record.attempts += 1;
        record.submitted_at = Some(now);
        record.is_verified = verified;
        Ok(())
    }

    async fn list_active_challenges(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ChallengeRecord>, RepositoryError> {
        let mut active: Vec<ChallengeRecord> = self
            .challenges
            .iter()
            .filter_map(|records| records.last().cloned())
            .filter(|record| record.is_active(now))
            .collect();
        active.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(active)
    }

    async fn list_submissions(&self) -> Result<Vec<Submission>, RepositoryError> {
        let mut all: Vec<Submission> = self
            .submissions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| b.connected_at.cmp(&a.connected_at));
        Ok(all)
    }

    async fn get_submission(&self, id: &Uuid) -> Result<Option<Submission>, RepositoryError> {
        Ok(self.submissions.get(id).map(|entry| entry.value().clone()))
    }

    async fn decide_submission(
        &self,
        id: &Uuid,
        decision: &ReviewDecision,
    ) -> Result<ReviewOutcome, RepositoryError> {
        let Some(mut submission) = self.submissions.get_mut(id) else {
            return Ok(ReviewOutcome::NotFound);
        };
        if submission.review_status != ReviewStatus::Pending {
            return Ok(ReviewOutcome::AlreadyDecided(submission.review_status));
        }
        submission.review_status = decision.action.resulting_status();
        submission.reviewed_at = Some(decision.reviewed_at);
        submission.reviewed_by = Some(decision.reviewed_by.clone());
        submission.review_notes = decision.notes.clone();
        Ok(ReviewOutcome::Decided(submission.clone()))
    }
}
