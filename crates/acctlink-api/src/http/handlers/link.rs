//! Link workflow endpoints under `/providers`.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};

use acctlink_types::secret::Credentials;

use crate::http::error::AppError;
use crate::http::extractors::session::SessionHeader;
use crate::state::AppState;

/// Request body for challenge submission.
#[derive(Debug, Deserialize)]
pub struct ChallengeBody {
    pub code: String,
}

/// Request body for finalizing a link.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBody {
    pub account_ids: Vec<String>,
}

/// GET /providers
pub async fn list_providers(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let providers = state.workflow.providers().await?;
    Ok(Json(json!({ "providers": providers })))
}

/// POST /providers/{id}/auth
pub async fn begin(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(credentials) = body?;
    let outcome = state.workflow.begin(&provider_id, credentials).await?;

    let mut response = json!({
        "success": true,
        "requiresChallenge": outcome.requires_challenge,
        "token": outcome.token,
    });
    if let Some(destination) = outcome.challenge_destination {
        response["challengeDestination"] = Value::String(destination);
    }
    Ok(Json(response))
}

/// POST /providers/{id}/verify-challenge
pub async fn submit_challenge(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    SessionHeader(token): SessionHeader,
    body: Result<Json<ChallengeBody>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body?;
    state
        .workflow
        .submit_challenge(&provider_id, &token, &body.code)
        .await?;
    Ok(Json(json!({ "success": true })))
}

/// GET /providers/{id}/accounts
pub async fn list_accounts(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    SessionHeader(token): SessionHeader,
) -> Result<Json<Value>, AppError> {
    let accounts = state.workflow.list_accounts(&provider_id, &token).await?;
    Ok(Json(json!({ "success": true, "accounts": accounts })))
}

/// POST /providers/{id}/sync
pub async fn confirm_sync(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    SessionHeader(token): SessionHeader,
    body: Result<Json<SyncBody>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body?;
    let connection_id = state
        .workflow
        .confirm_sync(&provider_id, &token, &body.account_ids)
        .await?;
    Ok(Json(json!({ "success": true, "connectionId": connection_id })))
}

/// DELETE /providers/{id}/session
pub async fn cancel(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    SessionHeader(token): SessionHeader,
) -> Result<Json<Value>, AppError> {
    state.workflow.cancel(&provider_id, &token).await?;
    Ok(Json(json!({ "success": true })))
}
