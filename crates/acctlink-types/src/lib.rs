//! Shared domain types for account linking.
//!
//! This crate contains the core domain types used across the workspace:
//! providers, link sessions, challenge records, account snapshots,
//! submissions, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror,
//! rust_decimal.

pub mod account;
pub mod challenge;
pub mod config;
pub mod error;
pub mod provider;
pub mod secret;
pub mod session;
pub mod submission;
