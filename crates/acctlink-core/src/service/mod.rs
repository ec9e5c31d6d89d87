//! Business logic services (use cases).
//!
//! Services orchestrate storage calls and business rules. They reach storage
//! only through the [`StorageFacade`](crate::storage::facade::StorageFacade)
//! -- never through concrete infrastructure implementations.

pub mod catalog;
pub mod clock;
pub mod policy;
pub mod review;
pub mod token;
pub mod workflow;
