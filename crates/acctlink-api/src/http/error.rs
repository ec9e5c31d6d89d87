//! Application error type mapping to HTTP status codes.
//!
//! Error body: `{ "success": false, "code": "...", "message": "..." }`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use acctlink_types::error::{LinkError, ReviewError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Link workflow errors.
    Link(LinkError),
    /// Review queue errors.
    Review(ReviewError),
    /// Malformed request outside the services' own validation.
    Validation(String),
    /// Missing session credentials on a session-scoped route.
    Unauthorized(String),
}

impl From<LinkError> for AppError {
    fn from(e: LinkError) -> Self {
        AppError::Link(e)
    }
}

impl From<ReviewError> for AppError {
    fn from(e: ReviewError) -> Self {
        AppError::Review(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Link(LinkError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Link(LinkError::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone())
            }
            AppError::Link(LinkError::Auth(msg)) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            AppError::Link(LinkError::BackendUnavailable(msg)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "BACKEND_UNAVAILABLE", msg.clone())
            }
            AppError::Review(ReviewError::NotFound) => {
                (StatusCode::NOT_FOUND, "SUBMISSION_NOT_FOUND", "Submission not found".to_string())
            }
            AppError::Review(e @ ReviewError::AlreadyDecided(_)) => {
                (StatusCode::CONFLICT, "ALREADY_DECIDED", e.to_string())
            }
            AppError::Review(e @ ReviewError::InvalidAction(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_ACTION", e.to_string())
            }
            AppError::Review(ReviewError::Unavailable) => (
                StatusCode::NOT_IMPLEMENTED,
                "REVIEW_UNAVAILABLE",
                "Review requires the persistent store".to_string(),
            ),
            AppError::Review(e @ ReviewError::Storage(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, "{message}");
        }

        let body = json!({
            "success": false,
            "code": code,
            "message": message,
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acctlink_types::submission::ReviewStatus;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Link(LinkError::Validation("x".into())), StatusCode::BAD_REQUEST),
            (AppError::Link(LinkError::NotFound("x".into())), StatusCode::NOT_FOUND),
            (AppError::Link(LinkError::Auth("x".into())), StatusCode::UNAUTHORIZED),
            (
                AppError::Link(LinkError::BackendUnavailable("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::Review(ReviewError::NotFound), StatusCode::NOT_FOUND),
            (
                AppError::Review(ReviewError::AlreadyDecided(ReviewStatus::Approved)),
                StatusCode::CONFLICT,
            ),
            (AppError::Review(ReviewError::InvalidAction("x".into())), StatusCode::BAD_REQUEST),
            (AppError::Review(ReviewError::Unavailable), StatusCode::NOT_IMPLEMENTED),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
