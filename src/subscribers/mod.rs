//! Event subscribers.
//!
//! - [`Subscribe`] trait implemented by event consumers;
//! - [`SubscriberSet`] fan-out with per-subscriber queues and panic isolation;
//! - [`LogWriter`] built-in subscriber forwarding to `tracing`.

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
