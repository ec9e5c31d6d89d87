//! Business logic and repository trait definitions for account linking.
//!
//! This crate defines the "ports" (repository traits) that the infrastructure
//! layer implements, the storage facade that routes between the persistent
//! and process-local stores, the link workflow state machine and the review
//! queue. It depends only on `acctlink-types` -- never on `acctlink-infra`
//! or any database/IO crate.

pub mod repository;
pub mod service;
pub mod storage;
