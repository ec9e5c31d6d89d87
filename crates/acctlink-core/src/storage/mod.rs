//! Storage selection and the process-local fallback store.

pub mod facade;
pub mod memory;
