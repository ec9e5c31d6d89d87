//! REST API handler modules.

pub mod admin;
pub mod health;
pub mod link;
