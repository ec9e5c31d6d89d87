//! Infrastructure layer for account linking.
//!
//! Contains the persistent implementation of the `LinkStore` port defined in
//! `acctlink-core` (SQLite via sqlx), the health probe the storage facade
//! uses to decide whether that store is reachable, and the `config.toml`
//! loader.

pub mod config;
pub mod sqlite;
