//! # Subscriber forwarding events to `tracing`.
//!
//! Failures are logged at `warn`, everything else at `info`:
//! ```text
//! INFO  procvisor: event kind=process_running key="worker-1" seq=12
//! WARN  procvisor: event kind=start_failed key="worker-2" reason="startup failed: ..." seq=13
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Logs every event through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let key = e.key.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::StartFailed | EventKind::ProcessFailed | EventKind::ReconcileFailed => {
                warn!(kind = %e.kind, key, reason, seq = e.seq, "event");
            }
            _ => info!(kind = %e.kind, key, seq = e.seq, "event"),
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
