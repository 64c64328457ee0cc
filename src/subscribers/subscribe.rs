//! # Extension point for event consumers.
//!
//! Each subscriber gets its own bounded queue and worker task inside a
//! [`SubscriberSet`](crate::SubscriberSet), so a slow or panicking subscriber only
//! affects itself. Overflowing events are dropped for that subscriber and logged.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use procvisor::{Event, EventKind, Subscribe};
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::ProcessFailed | EventKind::StartFailed) {
//!             // bump a counter...
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "failure-counter" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Consumer of supervisor events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event; called sequentially (FIFO) from the subscriber's worker.
    async fn on_event(&self, event: &Event);

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue (clamped to at least 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
