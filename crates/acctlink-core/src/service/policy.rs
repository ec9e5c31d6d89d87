//! Swappable demo policies.
//!
//! Credential rejection and simulated provider latency are explicit policy
//! objects rather than inline randomness. Neither is a security control:
//! no credential is ever checked against a real provider.

use std::time::Duration;

use acctlink_types::config::LinkConfig;
use acctlink_types::secret::Credentials;
use rand::Rng;

/// Decides whether a credential submission is accepted.
pub trait CredentialPolicy: Send + Sync {
    fn accept(&self, credentials: &Credentials) -> bool;
}

/// Accept every well-formed submission.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl CredentialPolicy for AcceptAll {
    fn accept(&self, _credentials: &Credentials) -> bool {
        true
    }
}

/// Reject every submission. Used to exercise the rejection branch.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectAll;

impl CredentialPolicy for RejectAll {
    fn accept(&self, _credentials: &Credentials) -> bool {
        false
    }
}

/// Reject a submission with fixed probability, mimicking a flaky provider.
#[derive(Debug, Clone, Copy)]
pub struct RandomRejection {
    rate: f64,
}

impl RandomRejection {
    /// `rate` is clamped into `[0, 1]`; NaN counts as 0.
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        Self { rate }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl CredentialPolicy for RandomRejection {
    fn accept(&self, _credentials: &Credentials) -> bool {
        !rand::rng().random_bool(self.rate)
    }
}

/// Build the credential policy selected by configuration.
pub fn credential_policy_from_config(config: &LinkConfig) -> Box<dyn CredentialPolicy> {
    if config.credential_rejection_rate > 0.0 {
        Box::new(RandomRejection::new(config.credential_rejection_rate))
    } else {
        Box::new(AcceptAll)
    }
}

/// Workflow operations that may be artificially delayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowOp {
    Begin,
    SubmitChallenge,
    ListAccounts,
    ConfirmSync,
}

/// Decides how long an operation pretends to wait on the provider.
pub trait LatencyPolicy: Send + Sync {
    fn delay_for(&self, op: WorkflowOp) -> Duration;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoLatency;

impl LatencyPolicy for NoLatency {
    fn delay_for(&self, _op: WorkflowOp) -> Duration {
        Duration::ZERO
    }
}

/// Fixed per-operation delays of a slow provider round trip.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedLatency;

impl LatencyPolicy for SimulatedLatency {
    fn delay_for(&self, op: WorkflowOp) -> Duration {
        match op {
            WorkflowOp::Begin => Duration::from_millis(2000),
            WorkflowOp::SubmitChallenge => Duration::from_millis(1500),
            WorkflowOp::ListAccounts => Duration::from_millis(1000),
            WorkflowOp::ConfirmSync => Duration::from_millis(3000),
        }
    }
}

pub fn latency_policy_from_config(config: &LinkConfig) -> Box<dyn LatencyPolicy> {
    if config.simulate_latency {
        Box::new(SimulatedLatency)
    } else {
        Box::new(NoLatency)
    }
}
