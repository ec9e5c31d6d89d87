//! Session token extractor.
//!
//! Reads the link session token from, in order:
//! - `session-token: <token>` header
//! - `sessiontoken: <token>` header (header names are case-insensitive, so
//!   this also covers `sessionToken`)
//! - `Authorization: Bearer <token>` header

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use acctlink_types::session::SessionToken;

use crate::http::error::AppError;

const HEADER_NAMES: [&str; 2] = ["session-token", "sessiontoken"];

/// The caller-supplied session token.
pub struct SessionHeader(pub SessionToken);

impl<S: Send + Sync> FromRequestParts<S> for SessionHeader {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_session_token(parts).map(SessionHeader)
    }
}

fn extract_session_token(parts: &Parts) -> Result<SessionToken, AppError> {
    for name in HEADER_NAMES {
        if let Some(value) = parts.headers.get(name) {
            let token = value.to_str().map_err(|_| {
                AppError::Unauthorized(format!("Invalid {name} header encoding"))
            })?;
            let token = token.trim();
            if !token.is_empty() {
                return Ok(SessionToken::new(token));
            }
        }
    }

    if let Some(auth) = parts.headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Ok(SessionToken::new(token));
            }
        }
    }

    Err(AppError::Unauthorized(
        "session token required: provide it via 'session-token' or 'Authorization: Bearer <token>' header".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/providers/chase/accounts");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_reads_session_token_header() {
        let parts = parts_with(&[("session-token", "lk_abc")]);
        assert_eq!(extract_session_token(&parts).unwrap().as_str(), "lk_abc");
    }

    #[test]
    fn test_reads_camel_case_header() {
        let parts = parts_with(&[("sessionToken", "lk_camel")]);
        assert_eq!(extract_session_token(&parts).unwrap().as_str(), "lk_camel");
    }

    #[test]
    fn test_reads_bearer_header() {
        let parts = parts_with(&[("authorization", "Bearer lk_bearer ")]);
        assert_eq!(extract_session_token(&parts).unwrap().as_str(), "lk_bearer");
    }

    #[test]
    fn test_missing_or_blank_header_is_unauthorized() {
        assert!(extract_session_token(&parts_with(&[])).is_err());
        assert!(extract_session_token(&parts_with(&[("session-token", "  ")])).is_err());
        assert!(extract_session_token(&parts_with(&[("authorization", "Basic abc")])).is_err());
    }
}
