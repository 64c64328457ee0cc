//! # Task batches with cancellation policies.
//!
//! - [`CancelPolicy`] decides when a batch's shared scope is cancelled.
//! - [`sequential`] runs tasks in order; [`parallel`] runs them concurrently.
//!
//! Processes, composition groups and the supervisor use these executors for startup
//! and teardown.

mod executor;
mod policy;

pub use executor::{parallel, sequential};
pub use policy::CancelPolicy;
