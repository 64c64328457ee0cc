//! Supervisor events and the broadcast bus carrying them.
//!
//! - [`EventKind`], [`Event`] classification and payload;
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
