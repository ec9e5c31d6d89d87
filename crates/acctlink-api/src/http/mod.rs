//! HTTP/REST API layer.
//!
//! Axum-based JSON API for the link workflow (`/providers/...`) and the
//! review queue (`/admin/...`), with CORS and request tracing.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
