//! Review queue endpoints under `/admin`.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use acctlink_types::challenge::ChallengeRecord;
use acctlink_types::submission::{ReviewStats, Submission};

use crate::http::error::AppError;
use crate::state::AppState;

/// Request body for a review decision.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewBody {
    pub connection_id: String,
    pub action: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// An issued challenge as shown to operators. The session token is cut to
/// its prefix.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedChallengeView {
    pub token_prefix: String,
    pub code: String,
    pub destination: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
}

impl From<&ChallengeRecord> for IssuedChallengeView {
    fn from(record: &ChallengeRecord) -> Self {
        Self {
            token_prefix: record.token.prefix().to_string(),
            code: record.code.clone(),
            destination: record.destination.clone(),
            issued_at: record.issued_at,
            expires_at: record.expires_at,
            attempts: record.attempts,
        }
    }
}

fn parse_connection_id(raw: &str) -> Result<Uuid, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid connection id: '{raw}'")))
}

/// GET /admin/submissions
pub async fn list_submissions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Submission>>, AppError> {
    Ok(Json(state.review.list_submissions().await?))
}

/// GET /admin/submissions/{id}
pub async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Submission>, AppError> {
    let id = parse_connection_id(&id)?;
    Ok(Json(state.review.get(&id).await?))
}

/// POST /admin/action
pub async fn decide(
    State(state): State<AppState>,
    body: Result<Json<ReviewBody>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body?;
    let id = parse_connection_id(&body.connection_id)?;
    let submission = state.review.decide_str(&id, &body.action, body.notes).await?;
    Ok(Json(json!({
        "success": true,
        "reviewStatus": submission.review_status,
    })))
}

/// GET /admin/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<ReviewStats>, AppError> {
    Ok(Json(state.review.stats().await?))
}

/// GET /admin/challenges
pub async fn issued_challenges(
    State(state): State<AppState>,
) -> Result<Json<Vec<IssuedChallengeView>>, AppError> {
    let records = state.review.issued_challenges().await?;
    Ok(Json(records.iter().map(IssuedChallengeView::from).collect()))
}
