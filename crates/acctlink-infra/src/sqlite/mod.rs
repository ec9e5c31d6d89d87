//! SQLite storage layer.
//!
//! The persistent `LinkStore` backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod health;
pub mod link_store;
pub mod pool;
