//! Link store trait definition.

use acctlink_types::challenge::ChallengeRecord;
use acctlink_types::error::RepositoryError;
use acctlink_types::provider::ProviderConfig;
use acctlink_types::session::{LinkSession, LinkStage, SessionToken};
use acctlink_types::submission::{ReviewDecision, ReviewOutcome, Submission};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Repository trait covering every record family the link workflow touches.
///
/// Four entity families share one contract so that the persistent store and
/// the process-local fallback store are interchangeable:
/// - **Providers:** seeded reference data.
/// - **Sessions:** link sessions keyed by token.
/// - **Challenges:** one-time-code records keyed by session token.
/// - **Submissions:** finalized connections with their linked accounts.
///
/// Every mutating method is a single atomic unit in the implementation:
/// conditional updates are expressed as one statement (or one locked entry),
/// never as read-modify-write across round trips.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait LinkStore: Send + Sync {
    // -----------------------------------------------------------------------
    // Providers
    // -----------------------------------------------------------------------

    /// Number of provider configs currently stored.
    fn count_providers(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Insert provider configs. Existing ids are left untouched.
    fn insert_providers(
        &self,
        providers: &[ProviderConfig],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// All providers in seed order.
    fn list_providers(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ProviderConfig>, RepositoryError>> + Send;

    fn get_provider(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ProviderConfig>, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Persist a new session together with its first challenge record, if any.
    fn create_session(
        &self,
        session: &LinkSession,
        challenge: Option<&ChallengeRecord>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_session(
        &self,
        token: &SessionToken,
    ) -> impl std::future::Future<Output = Result<Option<LinkSession>, RepositoryError>> + Send;

    /// Record a collected challenge code and move the session to
    /// `ChallengeCollected`. When `challenge_id` is given, that record of the
    /// same session is counted as one verified attempt in the same unit.
    ///
    /// Applies only if the session is active, unexpired at `now`, and in one
    /// of [`LinkStage::CHALLENGE_OPEN`]. Returns `false` (writing nothing)
    /// when the session did not match.
    fn collect_challenge_code(
        &self,
        token: &SessionToken,
        code: &str,
        challenge_id: Option<&Uuid>,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Clear `is_active`. Returns `false` if the token is unknown.
    fn deactivate_session(
        &self,
        token: &SessionToken,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Mark the session `Finalized` and persist `submission` in one unit.
    ///
    /// Applies only if the session is active, unexpired at `now`, and its
    /// stage is one of `allowed_stages`. Returns `false` (writing nothing)
    /// otherwise.
    fn finalize_session(
        &self,
        token: &SessionToken,
        allowed_stages: &[LinkStage],
        now: DateTime<Utc>,
        submission: &Submission,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Challenges
    // -----------------------------------------------------------------------

    /// Newest challenge record for a session, active or not.
    fn latest_challenge(
        &self,
        token: &SessionToken,
    ) -> impl std::future::Future<Output = Result<Option<ChallengeRecord>, RepositoryError>> + Send;

    /// Count one submission attempt against a challenge record of `token`,
    /// stamping `submitted_at` and setting `is_verified` to `verified`.
    fn record_challenge_attempt(
        &self,
        token: &SessionToken,
        challenge_id: &Uuid,
        verified: bool,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Challenge records that are unverified and unexpired at `now`,
    /// newest first, excluding records superseded by a newer one.
    fn list_active_challenges(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<ChallengeRecord>, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Submissions
    // -----------------------------------------------------------------------

    /// All submissions with their accounts, newest first.
    fn list_submissions(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Submission>, RepositoryError>> + Send;

    fn get_submission(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Submission>, RepositoryError>> + Send;

    /// Apply a review decision if and only if the submission is still pending.
    fn decide_submission(
        &self,
        id: &Uuid,
        decision: &ReviewDecision,
    ) -> impl std::future::Future<Output = Result<ReviewOutcome, RepositoryError>> + Send;
}
