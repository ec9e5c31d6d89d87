//! Observability setup for the account linking service.

pub mod tracing_setup;
