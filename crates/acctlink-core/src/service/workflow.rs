//! Link workflow state machine.
//!
//! A link session moves strictly forward:
//!
//! ```text
//! initiated -> authenticated -> challenge_issued -> challenge_collected -> finalized
//! ```
//!
//! Every token-taking operation first loads the session and rejects it if it
//! is unknown, deactivated or past `expires_at`, and only then applies the
//! stage gate for that operation. Expiry is evaluated lazily against the
//! injected [`Clock`]; nothing reaps expired sessions.
//!
//! Each operation selects its storage backend exactly once and performs all
//! of its reads and writes against that backend.

use std::sync::Arc;

use acctlink_types::account::{AccountSnapshot, LinkedAccount};
use acctlink_types::challenge::{ChallengeRecord, DEFAULT_CHALLENGE_DESTINATION, is_well_formed_code};
use acctlink_types::config::{ChallengeVerificationMode, LinkConfig};
use acctlink_types::error::LinkError;
use acctlink_types::provider::ProviderConfig;
use acctlink_types::secret::Credentials;
use acctlink_types::session::{LinkSession, LinkStage, SessionToken};
use acctlink_types::submission::{ReviewStatus, Submission};
use chrono::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::service::catalog;
use crate::service::clock::{Clock, SystemClock};
use crate::service::policy::{
    CredentialPolicy, LatencyPolicy, WorkflowOp, credential_policy_from_config,
    latency_policy_from_config,
};
use crate::service::token::{mint_challenge_code, mint_session_token};
use crate::storage::facade::{SelectedStore, StorageFacade};

const SESSION_REQUIRED: &str = "session token required";
const SESSION_INVALID: &str = "invalid or expired session";
const SESSION_FINALIZED: &str = "session already finalized";
const SESSION_WRONG_PROVIDER: &str = "session does not belong to this provider";
const CHALLENGE_REQUIRED: &str = "challenge required";
const CHALLENGE_MISMATCH: &str = "invalid verification code";

/// Result of a successful [`LinkWorkflow::begin`].
#[derive(Debug, Clone)]
pub struct BeginOutcome {
    pub token: SessionToken,
    pub requires_challenge: bool,
    /// Masked delivery destination, present only when a challenge was issued.
    pub challenge_destination: Option<String>,
}

/// The session workflow engine.
pub struct LinkWorkflow {
    storage: Arc<StorageFacade>,
    config: LinkConfig,
    credential_policy: Box<dyn CredentialPolicy>,
    latency_policy: Box<dyn LatencyPolicy>,
    clock: Arc<dyn Clock>,
}

impl LinkWorkflow {
    /// Build an engine whose policies follow `config`.
    pub fn new(storage: Arc<StorageFacade>, config: LinkConfig) -> Self {
        Self {
            credential_policy: credential_policy_from_config(&config),
            latency_policy: latency_policy_from_config(&config),
            storage,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_credential_policy<P: CredentialPolicy + 'static>(mut self, policy: P) -> Self {
        self.credential_policy = Box::new(policy);
        self
    }

    pub fn with_latency_policy<P: LatencyPolicy + 'static>(mut self, policy: P) -> Self {
        self.latency_policy = Box::new(policy);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Active providers in catalog order.
    pub async fn providers(&self) -> Result<Vec<ProviderConfig>, LinkError> {
        let store = self.storage.select().await?;
        let providers = store.list_providers().await?;
        Ok(providers.into_iter().filter(|p| p.is_active).collect())
    }

    /// Submit credentials for `provider_id` and open a link session.
    pub async fn begin(
        &self,
        provider_id: &str,
        credentials: Credentials,
    ) -> Result<BeginOutcome, LinkError> {
        if credentials.username.trim().is_empty() || credentials.password.is_blank() {
            return Err(LinkError::Validation(
                "username and password are required".to_string(),
            ));
        }

        let store = self.storage.select().await?;
        let provider = store
            .get_provider(provider_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| LinkError::NotFound(format!("unknown provider: {provider_id}")))?;

        if provider.requires_security_answer && !credentials.has_security_answer() {
            return Err(LinkError::Validation(
                "security answer is required for this provider".to_string(),
            ));
        }

        self.simulate(WorkflowOp::Begin).await;

        if !self.credential_policy.accept(&credentials) {
            warn!(provider_id, username = %credentials.username, "Credential submission rejected by policy");
            return Err(LinkError::Auth("invalid credentials".to_string()));
        }

        let now = self.clock.now();
        let token = mint_session_token();
        let stage = if provider.requires_challenge {
            LinkStage::ChallengeIssued
        } else {
            LinkStage::Authenticated
        };

        let challenge = provider.requires_challenge.then(|| ChallengeRecord {
            id: Uuid::now_v7(),
            token: token.clone(),
            code: mint_challenge_code(),
            destination: DEFAULT_CHALLENGE_DESTINATION.to_string(),
            issued_at: now,
            submitted_at: None,
            is_verified: false,
            attempts: 0,
            expires_at: now + secs(self.config.challenge_ttl_secs),
        });

        let session = LinkSession {
            token: token.clone(),
            provider_id: provider.id.clone(),
            owner_id: self.config.default_owner_id.clone(),
            credentials,
            stage,
            collected_code: None,
            is_active: true,
            created_at: now,
            expires_at: now + secs(self.config.session_ttl_secs),
        };

        store.create_session(&session, challenge.as_ref()).await?;

        info!(
            provider_id,
            token_prefix = token.prefix(),
            backend = %store.backend(),
            %stage,
            "Link session opened"
        );
        if let Some(record) = &challenge {
            info!(
                provider_id,
                token_prefix = token.prefix(),
                challenge_code = %record.code,
                destination = %record.destination,
                "Challenge code issued"
            );
        }

        Ok(BeginOutcome {
            token,
            requires_challenge: provider.requires_challenge,
            challenge_destination: challenge.map(|record| record.destination),
        })
    }

    /// Collect a challenge code for the session.
    ///
    /// With [`ChallengeVerificationMode::None`] any well-formed code is
    /// accepted and recorded for human review. With
    /// [`ChallengeVerificationMode::MatchIssued`] the code must equal the
    /// session's latest unexpired issued code. Resubmitting after a
    /// successful collection is allowed and overwrites the collected code.
    pub async fn submit_challenge(
        &self,
        provider_id: &str,
        token: &SessionToken,
        code: &str,
    ) -> Result<(), LinkError> {
        let now = self.clock.now();
        let store = self.storage.select().await?;
        let session = self.live_session(&store, provider_id, token).await?;

        if !LinkStage::CHALLENGE_OPEN.contains(&session.stage) {
            return Err(stage_error(session.stage, SESSION_INVALID));
        }
        if !is_well_formed_code(code) {
            return Err(LinkError::Validation(
                "verification code must be exactly 6 digits".to_string(),
            ));
        }

        self.simulate(WorkflowOp::SubmitChallenge).await;

        let record = store.latest_challenge(token).await?;
        if self.config.challenge_verification == ChallengeVerificationMode::MatchIssued {
            // A verified record stays valid until expiry so a collected
            // session can resubmit its code.
            match record.as_ref().filter(|r| now < r.expires_at) {
                Some(issued) if issued.code == code => {}
                Some(issued) => {
                    store
                        .record_challenge_attempt(token, &issued.id, false, now)
                        .await?;
                    warn!(provider_id, token_prefix = token.prefix(), "Challenge code mismatch");
                    return Err(LinkError::Auth(CHALLENGE_MISMATCH.to_string()));
                }
                None => {
                    warn!(provider_id, token_prefix = token.prefix(), "No active challenge to verify against");
                    return Err(LinkError::Auth(CHALLENGE_MISMATCH.to_string()));
                }
            }
        }

        let challenge_id = record.as_ref().map(|r| &r.id);
        if !store
            .collect_challenge_code(token, code, challenge_id, now)
            .await?
        {
            return Err(LinkError::Auth(SESSION_INVALID.to_string()));
        }

        info!(
            provider_id,
            token_prefix = token.prefix(),
            collected_code = code,
            "Challenge code collected"
        );
        Ok(())
    }

    /// Candidate accounts for the session's provider.
    pub async fn list_accounts(
        &self,
        provider_id: &str,
        token: &SessionToken,
    ) -> Result<Vec<AccountSnapshot>, LinkError> {
        let store = self.storage.select().await?;
        let session = self.live_session(&store, provider_id, token).await?;
        let provider = self.session_provider(&store, &session).await?;
        check_account_stage(&provider, session.stage)?;

        self.simulate(WorkflowOp::ListAccounts).await;

        Ok(catalog::account_snapshots(&provider.id))
    }

    /// Persist the selected accounts as a pending submission and finalize the
    /// session. Returns the new submission's id.
    ///
    /// Ids that match no candidate account are skipped; duplicates collapse.
    pub async fn confirm_sync(
        &self,
        provider_id: &str,
        token: &SessionToken,
        account_ids: &[String],
    ) -> Result<Uuid, LinkError> {
        let store = self.storage.select().await?;
        let session = self.live_session(&store, provider_id, token).await?;
        let provider = self.session_provider(&store, &session).await?;
        check_account_stage(&provider, session.stage)?;

        if account_ids.is_empty() {
            return Err(LinkError::Validation(
                "at least one account id is required".to_string(),
            ));
        }
        if account_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(LinkError::Validation("account ids must not be blank".to_string()));
        }

        let selected: Vec<AccountSnapshot> = catalog::account_snapshots(&provider.id)
            .into_iter()
            .filter(|snapshot| account_ids.iter().any(|id| *id == snapshot.id))
            .collect();
        if selected.is_empty() {
            return Err(LinkError::Validation(
                "no account ids match this provider's accounts".to_string(),
            ));
        }

        self.simulate(WorkflowOp::ConfirmSync).await;

        let issued_code = store.latest_challenge(token).await?.map(|record| record.code);
        let now = self.clock.now();
        let connection_id = Uuid::now_v7();
        let submission = Submission {
            id: connection_id,
            provider_id: provider.id.clone(),
            provider_name: provider.display_name.clone(),
            owner_id: session.owner_id.clone(),
            username: session.credentials.username.clone(),
            challenge_code: session.collected_code.clone(),
            issued_code,
            connected_at: now,
            review_status: ReviewStatus::Pending,
            reviewed_at: None,
            reviewed_by: None,
            review_notes: None,
            accounts: selected
                .iter()
                .map(|snapshot| LinkedAccount::from_snapshot(connection_id, snapshot))
                .collect(),
        };

        let allowed = account_stages(&provider);
        if !store.finalize_session(token, allowed, now, &submission).await? {
            return Err(LinkError::Auth(SESSION_INVALID.to_string()));
        }

        info!(
            provider_id,
            token_prefix = token.prefix(),
            %connection_id,
            accounts = submission.accounts.len(),
            backend = %store.backend(),
            "Link session finalized, submission pending review"
        );
        Ok(connection_id)
    }

    /// Abandon the session. The token becomes unusable.
    pub async fn cancel(&self, provider_id: &str, token: &SessionToken) -> Result<(), LinkError> {
        let store = self.storage.select().await?;
        self.live_session(&store, provider_id, token).await?;
        if !store.deactivate_session(token).await? {
            return Err(LinkError::Auth(SESSION_INVALID.to_string()));
        }
        info!(provider_id, token_prefix = token.prefix(), "Link session cancelled");
        Ok(())
    }

    /// Load the session and reject it unless it is live and belongs to
    /// `provider_id`.
    async fn live_session(
        &self,
        store: &SelectedStore<'_>,
        provider_id: &str,
        token: &SessionToken,
    ) -> Result<LinkSession, LinkError> {
        if token.as_str().trim().is_empty() {
            return Err(LinkError::Auth(SESSION_REQUIRED.to_string()));
        }

        let session = store
            .get_session(token)
            .await?
            .filter(|s| s.is_live(self.clock.now()))
            .ok_or_else(|| {
                debug!(token_prefix = token.prefix(), "Session unknown, inactive or expired");
                LinkError::Auth(SESSION_INVALID.to_string())
            })?;

        if session.provider_id != provider_id {
            return Err(LinkError::Auth(SESSION_WRONG_PROVIDER.to_string()));
        }
        Ok(session)
    }

    async fn session_provider(
        &self,
        store: &SelectedStore<'_>,
        session: &LinkSession,
    ) -> Result<ProviderConfig, LinkError> {
        store
            .get_provider(&session.provider_id)
            .await?
            .ok_or_else(|| LinkError::NotFound(format!("unknown provider: {}", session.provider_id)))
    }

    async fn simulate(&self, op: WorkflowOp) {
        let delay = self.latency_policy.delay_for(op);
        if !delay.is_zero() {
            debug!(?op, delay_ms = delay.as_millis() as u64, "Simulating provider latency");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Stages from which accounts may be listed or synced.
fn account_stages(provider: &ProviderConfig) -> &'static [LinkStage] {
    if provider.requires_challenge {
        &[LinkStage::ChallengeCollected]
    } else {
        &LinkStage::CHALLENGE_OPEN
    }
}

fn check_account_stage(provider: &ProviderConfig, stage: LinkStage) -> Result<(), LinkError> {
    if account_stages(provider).contains(&stage) {
        Ok(())
    } else {
        Err(stage_error(stage, CHALLENGE_REQUIRED))
    }
}

fn stage_error(stage: LinkStage, otherwise: &str) -> LinkError {
    if stage.is_terminal() {
        LinkError::Auth(SESSION_FINALIZED.to_string())
    } else {
        LinkError::Auth(otherwise.to_string())
    }
}

fn secs(value: u64) -> Duration {
    Duration::seconds(value.min(u32::MAX as u64) as i64)
}
