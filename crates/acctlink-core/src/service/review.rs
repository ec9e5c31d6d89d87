//! Human review queue for finalized submissions.
//!
//! Submissions are read from the persistent store only. With no persistent
//! store configured, or while it is unhealthy, every call fails with
//! [`ReviewError::Unavailable`].

use std::sync::Arc;

use acctlink_types::challenge::ChallengeRecord;
use acctlink_types::error::ReviewError;
use acctlink_types::submission::{
    ReviewAction, ReviewDecision, ReviewOutcome, ReviewStats, ReviewStatus, Submission,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::repository::box_store::BoxLinkStore;
use crate::service::clock::{Clock, SystemClock};
use crate::storage::facade::StorageFacade;

pub struct ReviewQueue {
    storage: Arc<StorageFacade>,
    reviewer_id: String,
    clock: Arc<dyn Clock>,
}

impl ReviewQueue {
    /// `reviewer_id` is stamped on every decision.
    pub fn new(storage: Arc<StorageFacade>, reviewer_id: impl Into<String>) -> Self {
        Self {
            storage,
            reviewer_id: reviewer_id.into(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn store(&self) -> Result<&BoxLinkStore, ReviewError> {
        self.storage.persistent_if_healthy().await.ok_or_else(|| {
            warn!("Review requested but persistent store is unavailable");
            ReviewError::Unavailable
        })
    }

    /// All submissions, pending first, then newest first.
    pub async fn list_submissions(&self) -> Result<Vec<Submission>, ReviewError> {
        let mut submissions = self.store().await?.list_submissions().await?;
        submissions.sort_by(|a, b| {
            let a_pending = a.review_status == ReviewStatus::Pending;
            let b_pending = b.review_status == ReviewStatus::Pending;
            b_pending
                .cmp(&a_pending)
                .then_with(|| b.connected_at.cmp(&a.connected_at))
        });
        Ok(submissions)
    }

    pub async fn get(&self, connection_id: &Uuid) -> Result<Submission, ReviewError> {
        self.store()
            .await?
            .get_submission(connection_id)
            .await?
            .ok_or(ReviewError::NotFound)
    }

    /// Approve or decline a pending submission.
    ///
    /// Blank notes are stored as absent. A submission is decided exactly
    /// once; later attempts fail with [`ReviewError::AlreadyDecided`].
    pub async fn decide(
        &self,
        connection_id: &Uuid,
        action: ReviewAction,
        notes: Option<String>,
    ) -> Result<Submission, ReviewError> {
        let store = self.store().await?;
        let decision = ReviewDecision {
            action,
            reviewed_by: self.reviewer_id.clone(),
            reviewed_at: self.clock.now(),
            notes: notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        };

        match store.decide_submission(connection_id, &decision).await? {
            ReviewOutcome::Decided(submission) => {
                info!(
                    %connection_id,
                    status = %submission.review_status,
                    reviewed_by = %self.reviewer_id,
                    "Submission reviewed"
                );
                Ok(submission)
            }
            ReviewOutcome::AlreadyDecided(status) => {
                warn!(%connection_id, %status, "Submission already decided");
                Err(ReviewError::AlreadyDecided(status))
            }
            ReviewOutcome::NotFound => Err(ReviewError::NotFound),
        }
    }

    /// Like [`decide`](Self::decide) with the action given as text.
    pub async fn decide_str(
        &self,
        connection_id: &Uuid,
        action: &str,
        notes: Option<String>,
    ) -> Result<Submission, ReviewError> {
        let action = action
            .parse::<ReviewAction>()
            .map_err(|_| ReviewError::InvalidAction(action.to_string()))?;
        self.decide(connection_id, action, notes).await
    }

    /// Pending / approved / declined counts.
    pub async fn stats(&self) -> Result<ReviewStats, ReviewError> {
        let submissions = self.store().await?.list_submissions().await?;
        Ok(ReviewStats::tally(&submissions))
    }

    /// Challenge codes currently issued and not yet collected, newest first.
    ///
    /// Read from whichever backend the workflow is currently writing to,
    /// since that is where live challenges are.
    pub async fn issued_challenges(&self) -> Result<Vec<ChallengeRecord>, ReviewError> {
        let store = self
            .storage
            .select()
            .await
            .map_err(|_| ReviewError::Unavailable)?;
        Ok(store.list_active_challenges(self.clock.now()).await?)
    }
}
