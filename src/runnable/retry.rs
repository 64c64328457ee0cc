//! # Retry: one runnable, restarted under a policy.
//!
//! [`Retry`] keeps re-running an inner runnable while presenting a single, stable unit
//! to its owner:
//!
//! ```text
//! attempt 1 ──ready──► outer callback (called once) ─────────────────► returns ─► release
//!     └─ fails ─► backoff ─► attempt 2 ──ready (silent)──┘                          │
//!                                └─ fails ─► backoff ─► attempt 3 ... ◄── released ─┘
//! ```
//!
//! - the outer callback runs once, after the first attempt became ready;
//! - when an attempt ends on its own, [`RestartPolicy::after`] decides whether to
//!   run it again and after which delay (slept on the [`Clock`](crate::Clock));
//! - when the outer callback returns, the current attempt is released and the run
//!   returns the callback's result combined with the attempt's.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::clock::ClockRef;
use crate::error::Error;
use crate::policies::{BackoffPolicy, RestartPolicy};
use crate::runnable::{Callback, Runnable, RunnableRef};

/// Runnable that restarts its inner runnable per [`RestartPolicy`].
pub struct Retry {
    name: String,
    inner: RunnableRef,
    clock: ClockRef,
    restart: RestartPolicy,
    backoff: BackoffPolicy,
}

impl Retry {
    /// Wraps `inner` with [`RestartPolicy::OnFailure`] and the default backoff.
    pub fn new(inner: RunnableRef, clock: ClockRef) -> Self {
        Self {
            name: format!("retry({})", inner.name()),
            inner,
            clock,
            restart: RestartPolicy::default(),
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_restart(mut self, restart: RestartPolicy) -> Self {
        self.restart = restart;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Runs attempts until the policy gives up, `scope` is cancelled or the outer
    /// callback released the unit. Cancels `scope` before returning.
    async fn attempts(
        &self,
        scope: &CancellationToken,
        ready: &CancellationToken,
        released: &CancellationToken,
    ) -> Result<(), Error> {
        let mut failures = 0u32;

        let res = loop {
            let attempt_ready = ready.clone();
            let attempt_released = released.clone();
            let callback = Callback::new(move |ctx: CancellationToken| async move {
                attempt_ready.cancel();
                tokio::select! {
                    _ = attempt_released.cancelled() => {}
                    _ = ctx.cancelled() => {}
                }
                Ok(())
            });

            let res = self.inner.run(scope.child_token(), callback).await;
            if released.is_cancelled() || scope.is_cancelled() {
                break res;
            }

            failures = if res.is_err() { failures.saturating_add(1) } else { 0 };
            let Some(delay) = self.restart.after(&res, failures, &self.backoff) else {
                break res;
            };
            match &res {
                Err(err) => warn!(runnable = self.inner.name(), error = %err, ?delay, failures, "attempt failed, restarting"),
                Ok(()) => debug!(runnable = self.inner.name(), ?delay, "attempt returned, restarting"),
            }

            if !delay.is_zero() {
                let mut timer = self.clock.after(delay);
                tokio::select! {
                    _ = timer.fired() => {}
                    _ = scope.cancelled() => break res,
                }
            }
        };

        scope.cancel();
        res
    }
}

#[async_trait]
impl Runnable for Retry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken, callback: Callback) -> Result<(), Error> {
        let scope = ctx.child_token();
        let ready = CancellationToken::new();
        let released = CancellationToken::new();

        let foreground = async {
            tokio::select! {
                _ = ready.cancelled() => {}
                _ = scope.cancelled() => return None,
            }
            let res = callback.call(scope.clone()).await;
            released.cancel();
            Some(res)
        };
        let background = self.attempts(&scope, &ready, &released);

        match tokio::join!(foreground, background) {
            (Some(res), attempts) => res.and(attempts),
            (None, attempts) => attempts,
        }
    }
}
