//! # Broadcast bus for supervisor events.
//!
//! ```text
//! Supervisor ──publish──► Bus ──► Supervisor::subscribe() receivers
//!  watchdogs ──┘            └───► listener ──► SubscriberSet ──► Subscribe impls
//! ```
//!
//! - `publish` never blocks; with no receivers the event is dropped;
//! - the ring buffer holds `capacity` events shared by all receivers;
//! - a receiver that falls behind observes `RecvError::Lagged(n)` and skips `n` events.

use tokio::sync::broadcast;

use crate::events::Event;

/// Cloneable broadcast channel for [`Event`]s.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus holding at most `capacity` (min 1) undelivered events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// New receiver; only sees events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn receivers_see_events_after_subscribing() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::SupervisorStarted));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::AllStopped));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::AllStopped);
    }

    #[tokio::test]
    async fn slow_receiver_lags() {
        let bus = Bus::new(1);
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::ProcessStarting));
        bus.publish(Event::new(EventKind::ProcessRunning));

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::ProcessRunning);
    }
}
