//! BoxLinkStore -- object-safe dynamic dispatch wrapper for LinkStore.
//!
//! 1. Define an object-safe `LinkStoreDyn` trait with boxed futures
//! 2. Blanket-impl `LinkStoreDyn` for all `T: LinkStore`
//! 3. `BoxLinkStore` wraps `Box<dyn LinkStoreDyn>` and delegates
//!
//! The storage facade holds two of these (persistent and fallback) and picks
//! one per operation.

use std::future::Future;
use std::pin::Pin;

use acctlink_types::challenge::ChallengeRecord;
use acctlink_types::error::RepositoryError;
use acctlink_types::provider::ProviderConfig;
use acctlink_types::session::{LinkSession, LinkStage, SessionToken};
use acctlink_types::submission::{ReviewDecision, ReviewOutcome, Submission};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::link_store::LinkStore;

type BoxFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

/// Object-safe version of [`LinkStore`] with boxed futures.
///
/// This trait exists solely to enable dynamic dispatch (`dyn LinkStoreDyn`).
/// A blanket implementation is provided for all types implementing `LinkStore`.
pub trait LinkStoreDyn: Send + Sync {
    fn count_providers_boxed(&self) -> BoxFut<'_, u64>;

    fn insert_providers_boxed<'a>(&'a self, providers: &'a [ProviderConfig]) -> BoxFut<'a, ()>;

    fn list_providers_boxed(&self) -> BoxFut<'_, Vec<ProviderConfig>>;

    fn get_provider_boxed<'a>(&'a self, id: &'a str) -> BoxFut<'a, Option<ProviderConfig>>;

    fn create_session_boxed<'a>(
        &'a self,
        session: &'a LinkSession,
        challenge: Option<&'a ChallengeRecord>,
    ) -> BoxFut<'a, ()>;

    fn get_session_boxed<'a>(&'a self, token: &'a SessionToken) -> BoxFut<'a, Option<LinkSession>>;

    fn collect_challenge_code_boxed<'a>(
        &'a self,
        token: &'a SessionToken,
        code: &'a str,
        challenge_id: Option<&'a Uuid>,
        now: DateTime<Utc>,
    ) -> BoxFut<'a, bool>;

    fn deactivate_session_boxed<'a>(&'a self, token: &'a SessionToken) -> BoxFut<'a, bool>;

    fn finalize_session_boxed<'a>(
        &'a self,
        token: &'a SessionToken,
        allowed_stages: &'a [LinkStage],
        now: DateTime<Utc>,
        submission: &'a Submission,
    ) -> BoxFut<'a, bool>;

    fn latest_challenge_boxed<'a>(
        &'a self,
        token: &'a SessionToken,
    ) -> BoxFut<'a, Option<ChallengeRecord>>;

    fn record_challenge_attempt_boxed<'a>(
        &'a self,
        token: &'a SessionToken,
        challenge_id: &'a Uuid,
        verified: bool,
        now: DateTime<Utc>,
    ) -> BoxFut<'a, ()>;

    fn list_active_challenges_boxed(&self, now: DateTime<Utc>) -> BoxFut<'_, Vec<ChallengeRecord>>;

    fn list_submissions_boxed(&self) -> BoxFut<'_, Vec<Submission>>;

    fn get_submission_boxed<'a>(&'a self, id: &'a Uuid) -> BoxFut<'a, Option<Submission>>;

    fn decide_submission_boxed<'a>(
        &'a self,
        id: &'a Uuid,
        decision: &'a ReviewDecision,
    ) -> BoxFut<'a, ReviewOutcome>;
}

/// Blanket implementation: any `LinkStore` automatically implements `LinkStoreDyn`.
impl<T: LinkStore> LinkStoreDyn for T {
    fn count_providers_boxed(&self) -> BoxFut<'_, u64> {
        Box::pin(self.count_providers())
    }

    fn insert_providers_boxed<'a>(&'a self, providers: &'a [ProviderConfig]) -> BoxFut<'a, ()> {
        Box::pin(self.insert_providers(providers))
    }

    fn list_providers_boxed(&self) -> BoxFut<'_, Vec<ProviderConfig>> {
        Box::pin(self.list_providers())
    }

    fn get_provider_boxed<'a>(&'a self, id: &'a str) -> BoxFut<'a, Option<ProviderConfig>> {
        Box::pin(self.get_provider(id))
    }

    fn create_session_boxed<'a>(
        &'a self,
        session: &'a LinkSession,
        challenge: Option<&'a ChallengeRecord>,
    ) -> BoxFut<'a, ()> {
        Box::pin(self.create_session(session, challenge))
    }

    fn get_session_boxed<'a>(&'a self, token: &'a SessionToken) -> BoxFut<'a, Option<LinkSession>> {
        Box::pin(self.get_session(token))
    }

    fn collect_challenge_code_boxed<'a>(
        &'a self,
        token: &'a SessionToken,
        code: &'a str,
        challenge_id: Option<&'a Uuid>,
        now: DateTime<Utc>,
    ) -> BoxFut<'a, bool> {
        Box::pin(self.collect_challenge_code(token, code, challenge_id, now))
    }

    fn deactivate_session_boxed<'a>(&'a self, token: &'a SessionToken) -> BoxFut<'a, bool> {
        Box::pin(self.deactivate_session(token))
    }

    fn finalize_session_boxed<'a>(
        &'a self,
        token: &'a SessionToken,
        allowed_stages: &'a [LinkStage],
        now: DateTime<Utc>,
        submission: &'a Submission,
    ) -> BoxFut<'a, bool> {
        Box::pin(self.finalize_session(token, allowed_stages, now, submission))
    }

    fn latest_challenge_boxed<'a>(
        &'a self,
        token: &'a SessionToken,
    ) -> BoxFut<'a, Option<ChallengeRecord>> {
        Box::pin(self.latest_challenge(token))
    }

    fn record_challenge_attempt_boxed<'a>(
        &'a self,
        token: &'a SessionToken,
        challenge_id: &'a Uuid,
        verified: bool,
        now: DateTime<Utc>,
    ) -> BoxFut<'a, ()> {
        Box::pin(self.record_challenge_attempt(token, challenge_id, verified, now))
    }

    fn list_active_challenges_boxed(&self, now: DateTime<Utc>) -> BoxFut<'_, Vec<ChallengeRecord>> {
        Box::pin(self.list_active_challenges(now))
    }

    fn list_submissions_boxed(&self) -> BoxFut<'_, Vec<Submission>> {
        Box::pin(self.list_submissions())
    }

    fn get_submission_boxed<'a>(&'a self, id: &'a Uuid) -> BoxFut<'a, Option<Submission>> {
        Box::pin(self.get_submission(id))
    }

    fn decide_submission_boxed<'a>(
        &'a self,
        id: &'a Uuid,
        decision: &'a ReviewDecision,
    ) -> BoxFut<'a, ReviewOutcome> {
        Box::pin(self.decide_submission(id, decision))
    }
}

/// Type-erased link store for runtime backend selection.
///
/// Since `LinkStore` uses RPITIT, it cannot be used as a trait object
/// directly. `BoxLinkStore` provides equivalent methods that delegate
/// to the inner `LinkStoreDyn` trait object.
pub struct BoxLinkStore {
    inner: Box<dyn LinkStoreDyn + Send + Sync>,
}

impl BoxLinkStore {
    /// Wrap a concrete `LinkStore` in a type-erased box.
    pub fn new<T: LinkStore + 'static>(store: T) -> Self {
        Self {
            inner: Box::new(store),
        }
    }

    pub async fn count_providers(&self) -> Result<u64, RepositoryError> {
        self.inner.count_providers_boxed().await
    }

    pub async fn insert_providers(
        &self,
        providers: &[ProviderConfig],
    ) -> Result<(), RepositoryError> {
        self.inner.insert_providers_boxed(providers).await
    }

    pub async fn list_providers(&self) -> Result<Vec<ProviderConfig>, RepositoryError> {
        self.inner.list_providers_boxed().await
    }

    pub async fn get_provider(&self, id: &str) -> Result<Option<ProviderConfig>, RepositoryError> {
        self.inner.get_provider_boxed(id).await
    }

    pub async fn create_session(
        &self,
        session: &LinkSession,
        challenge: Option<&ChallengeRecord>,
    ) -> Result<(), RepositoryError> {
        self.inner.create_session_boxed(session, challenge).await
    }

    pub async fn get_session(
        &self,
        token: &SessionToken,
    ) -> Result<Option<LinkSession>, RepositoryError> {
        self.inner.get_session_boxed(token).await
    }

    pub async fn collect_challenge_code(
        &self,
        token: &SessionToken,
        code: &str,
        challenge_id: Option<&Uuid>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        self.inner
            .collect_challenge_code_boxed(token, code, challenge_id, now)
            .await
    }

    pub async fn deactivate_session(&self, token: &SessionToken) -> Result<bool, RepositoryError> {
        self.inner.deactivate_session_boxed(token).await
    }

    pub async fn finalize_session(
        &self,
        token: &SessionToken,
        allowed_stages: &[LinkStage],
        now: DateTime<Utc>,
        submission: &Submission,
    ) -> Result<bool, RepositoryError> {
        self.inner
            .finalize_session_boxed(token, allowed_stages, now, submission)
            .await
    }

    pub async fn latest_challenge(
        &self,
        token: &SessionToken,
    ) -> Result<Option<ChallengeRecord>, RepositoryError> {
        self.inner.latest_challenge_boxed(token).await
    }

    pub async fn record_challenge_attempt(
        &self,
        token: &SessionToken,
        challenge_id: &Uuid,
        verified: bool,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.inner
            .record_challenge_attempt_boxed(token, challenge_id, verified, now)
            .await
    }

    pub async fn list_active_challenges(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ChallengeRecord>, RepositoryError> {
        self.inner.list_active_challenges_boxed(now).await
    }

    pub async fn list_submissions(&self) -> Result<Vec<Submission>, RepositoryError> {
        self.inner.list_submissions_boxed().await
    }

    pub async fn get_submission(&self, id: &Uuid) -> Result<Option<Submission>, RepositoryError> {
        self.inner.get_submission_boxed(id).await
    }

    pub async fn decide_submission(
        &self,
        id: &Uuid,
        decision: &ReviewDecision,
    ) -> Result<ReviewOutcome, RepositoryError> {
        self.inner.decide_submission_boxed(id, decision).await
    }
}
