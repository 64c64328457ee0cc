//! # Process lifecycle.
//!
//! - [`State`] lifecycle states (`Initial → Starting → Running → Stopped`)
//! - [`Process`] state machine wrapping one execution of a [`Runnable`](crate::Runnable)

#[allow(clippy::module_inception)]
mod process;
mod state;

pub use process::Process;
pub use state::State;
