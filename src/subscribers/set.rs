//! # Non-blocking fan-out to subscribers.
//!
//! ```text
//! emit(&Event)
//!     ├──► [queue 1] ──► worker 1 ──► on_event()   (panic → caught, logged)
//!     └──► [queue N] ──► worker N ──► on_event()
//! ```
//!
//! - `emit` never blocks (`try_send`);
//! - per-subscriber FIFO, no ordering across subscribers;
//! - a full or closed queue drops the event for that subscriber only.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::panic_message;
use crate::events::Event;
use crate::subscribers::Subscribe;

struct Channel {
    name: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Per-subscriber queues and workers.
pub struct SubscriberSet {
    channels: Vec<Channel>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber; must be called inside a tokio runtime.
    #[must_use]
    pub fn new(subs: &[Arc<dyn Subscribe>]) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            let sub = Arc::clone(sub);
            let name = sub.name();

            workers.push(tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
                        .catch_unwind()
                        .await;
                    if let Err(payload) = handled {
                        warn!(subscriber = name, panic = %panic_message(&*payload), "subscriber panicked");
                    }
                }
            }));
            channels.push(Channel { name, tx });
        }

        Self { channels, workers }
    }

    /// Queues `event` for every subscriber without waiting.
    pub fn emit(&self, event: Event) {
        let event = Arc::new(event);
        for channel in &self.channels {
            match channel.tx.try_send(Arc::clone(&event)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber = channel.name, seq = event.seq, "subscriber queue full, event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(subscriber = channel.name, seq = event.seq, "subscriber worker gone, event dropped");
                }
            }
        }
    }

    /// Closes the queues and waits until every worker drained its backlog.
    pub async fn shutdown(self) {
        drop(self.channels);
        for worker in self.workers {
            let _ = worker.await;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
