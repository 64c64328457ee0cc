//! # Runnable units and their composition.
//!
//! - [`Runnable`] / [`Callback`] the unit contract;
//! - [`RunnableFn`] closure-backed runnable;
//! - [`chain`], [`parallel`], [`sequential`] build one runnable out of several;
//! - [`Retry`] restarts a runnable under a [`RestartPolicy`](crate::RestartPolicy).

mod chain;
mod group;
mod retry;
#[allow(clippy::module_inception)]
mod runnable;
mod runnable_fn;

#[cfg(test)]
pub(crate) mod probe;

pub use chain::chain;
pub use group::{parallel, sequential};
pub use retry::Retry;
pub use runnable::{Callback, Runnable, RunnableRef};
pub use runnable_fn::RunnableFn;
