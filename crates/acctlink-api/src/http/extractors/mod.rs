//! Custom request extractors.

pub mod session;
