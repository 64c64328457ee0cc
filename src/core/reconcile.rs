//! # Reconciliation: start every table key that is not live.
//!
//! ```text
//! reconcile_loop:
//!   loop {
//!     timer(restart_interval) ──► reconcile() ──► for key in table, key not live:
//!                                                   tracker.spawn(restart(key))
//!   }
//! ```
//!
//! Each restart is independent; none of them blocks the loop or the others. Errors
//! (table iteration, failed restarts) are logged and published as events, never
//! propagated: the next pass simply tries again.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::Supervisor;
use crate::core::supervisor::{Key, Running};
use crate::error::Error;
use crate::events::{Event, EventKind};
use crate::runnable::Runnable;

impl<K: Key, R: Runnable + Clone> Supervisor<K, R> {
    /// Initial pass: waits for the issued restarts, at most `restore_wait`.
    pub(crate) async fn restore(&self, running: &Running) {
        let restarts = self.reconcile(running).await;
        if restarts.is_empty() {
            return;
        }

        let mut timer = self.shared.clock.after(self.shared.cfg.restore_wait);
        tokio::select! {
            _ = futures::future::join_all(restarts) => {}
            _ = timer.fired() => debug!("restore wait expired, remaining units keep starting"),
            _ = running.background.cancelled() => {}
        }
        timer.stop();
    }

    pub(crate) async fn reconcile_loop(self, running: Running) {
        let interval = self.shared.cfg.restart_interval_clamped();
        let mut timer = self.shared.clock.after(interval);

        loop {
            tokio::select! {
                _ = timer.fired() => {}
                _ = running.background.cancelled() => break,
            }
            tokio::select! {
                _ = self.reconcile(&running) => {}
                _ = running.background.cancelled() => break,
            }
            timer.reset(interval);
        }
        timer.stop();
    }

    /// One pass over the table; returns the handles of the restarts it issued.
    async fn reconcile(&self, running: &Running) -> Vec<JoinHandle<()>> {
        let mut cursor = match self.shared.table.iter().await {
            Ok(cursor) => cursor,
            Err(err) => {
                self.reconcile_failed(None, &err);
                return Vec::new();
            }
        };

        let mut restarts = Vec::new();
        while cursor.next().await {
            let key = match cursor.get() {
                Ok((key, _)) => key,
                Err(err) => {
                    self.reconcile_failed(None, &err);
                    continue;
                }
            };
            if self.shared.entries.contains_key(&key) {
                continue;
            }
            let restart = self
                .clone()
                .restart(key, running.background.clone());
            restarts.push(running.tracker.spawn(restart));
        }
        if let Some(err) = cursor.err() {
            self.reconcile_failed(None, &err);
        }
        cursor.close().await;

        restarts
    }

    async fn restart(self, key: K, bound: CancellationToken) {
        match self.start(&bound, key.clone()).await {
            Ok(_) => debug!(key = ?key, "restarted"),
            Err(err) if err.is_already_exists() || err.is_not_running() => {}
            Err(Error::Canceled) if bound.is_cancelled() => {}
            // already published as StartFailed
            Err(err @ Error::Startup { .. }) => warn!(key = ?key, error = %err, "restart failed"),
            Err(err) => self.reconcile_failed(Some(&key), &err),
        }
    }

    fn reconcile_failed(&self, key: Option<&K>, err: &Error) {
        warn!(key = ?key, error = %err, "reconciliation error");
        let ev = match key {
            Some(key) => Event::for_key(EventKind::ReconcileFailed, key),
            None => Event::new(EventKind::ReconcileFailed),
        };
        self.publish(ev.with_reason(err.to_string()));
    }
}
