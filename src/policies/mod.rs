//! Restart policies for the [`Retry`](crate::Retry) wrapper.
//!
//! - [`RestartPolicy`] whether an attempt that ended is run again;
//! - [`BackoffPolicy`] how long to wait after consecutive failures;
//! - [`JitterPolicy`] randomization applied on top of the backoff delay.
//!
//! ```text
//! attempt ends ──► RestartPolicy::after(result) ──► None        → Retry::run returns
//!                                               └─► Some(delay) → clock.after(delay) → next attempt
//! ```

mod backoff;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::RestartPolicy;
