//! # Parallel and sequential groups.
//!
//! A group starts every child as its own [`Process`], then invokes the caller's callback.
//!
//! ```text
//! run(ctx, callback)
//!   ├─► start children        (cancel-on-error; failure → teardown, callback never runs)
//!   ├─► callback(main)        (main is cancelled if any child exits on its own)
//!   └─► teardown children     (never-cancel; every child gets a stop attempt)
//! ```
//!
//! - `parallel`: children start and stop concurrently;
//! - `sequential`: children start in list order and stop in list order.
//!
//! A failed startup returns the failing child's error; siblings whose startup it
//! interrupted are not reported. The callback's error wins over teardown errors;
//! teardown errors are returned when the callback succeeded.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::select_all;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Error;
use crate::process::Process;
use crate::runnable::{Callback, Runnable, RunnableRef};
use crate::tasks::{self, CancelPolicy};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Parallel,
    Sequential,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Parallel => "parallel",
            Mode::Sequential => "sequential",
        })
    }
}

/// Builds a runnable that starts and stops `runnables` concurrently.
pub fn parallel<I>(runnables: I) -> RunnableRef
where
    I: IntoIterator<Item = RunnableRef>,
{
    Arc::new(Group::new(Mode::Parallel, runnables.into_iter().collect()))
}

/// Builds a runnable that starts `runnables` in list order and stops them in list order.
pub fn sequential<I>(runnables: I) -> RunnableRef
where
    I: IntoIterator<Item = RunnableRef>,
{
    Arc::new(Group::new(Mode::Sequential, runnables.into_iter().collect()))
}

struct Group {
    mode: Mode,
    name: String,
    children: Vec<RunnableRef>,
}

impl Group {
    fn new(mode: Mode, children: Vec<RunnableRef>) -> Self {
        let name = format!(
            "{mode}({})",
            children.iter().map(|r| r.name()).collect::<Vec<_>>().join(", ")
        );
        Self {
            mode,
            name,
            children,
        }
    }

    /// Starts every child; on failure returns the error that triggered the rollback.
    async fn start_all(&self, ctx: &CancellationToken, procs: &[Process]) -> Result<(), Error> {
        let starts: Vec<_> = procs
            .iter()
            .map(|p| {
                let p = p.clone();
                let parent = ctx.clone();
                move |bound: CancellationToken| async move {
                    match p.start(&bound).await {
                        // a sibling failed and cancelled the batch; its error is reported
                        Err(err) if is_interrupted(&err, &bound, &parent) => Ok(()),
                        res => res,
                    }
                }
            })
            .collect();
        match self.mode {
            Mode::Parallel => tasks::parallel(ctx, CancelPolicy::OnError, starts).await,
            Mode::Sequential => tasks::sequential(ctx, CancelPolicy::OnError, starts).await,
        }
    }

    async fn stop_all(&self, ctx: &CancellationToken, procs: &[Process]) -> Result<(), Error> {
        let stops: Vec<_> = procs
            .iter()
            .map(|p| {
                let p = p.clone();
                move |bound: CancellationToken| async move { p.ensure_stopped(&bound).await }
            })
            .collect();
        match self.mode {
            Mode::Parallel => tasks::parallel(ctx, CancelPolicy::Never, stops).await,
            Mode::Sequential => tasks::sequential(ctx, CancelPolicy::Never, stops).await,
        }
    }
}

fn is_interrupted(err: &Error, bound: &CancellationToken, parent: &CancellationToken) -> bool {
    matches!(err.root(), Error::Canceled) && bound.is_cancelled() && !parent.is_cancelled()
}

#[async_trait]
impl Runnable for Group {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken, callback: Callback) -> Result<(), Error> {
        if self.children.is_empty() {
            return callback.call(ctx).await;
        }

        let procs: Vec<Process> = self
            .children
            .iter()
            .map(|r| Process::new(&ctx, Arc::clone(r)))
            .collect();

        if let Err(err) = self.start_all(&ctx, &procs).await {
            if let Err(teardown) = self.stop_all(&ctx, &procs).await {
                debug!(group = %self.name, error = %teardown, "teardown after failed startup");
            }
            return Err(err);
        }

        let main = ctx.child_token();
        let mut foreground = std::pin::pin!(callback.call(main.clone()));
        let exited = select_all(procs.iter().map(|p| Box::pin(p.done())));

        let result = tokio::select! {
            res = &mut foreground => res,
            (_, idx, _) = exited => {
                debug!(group = %self.name, child = procs[idx].name(), "child exited, interrupting callback");
                main.cancel();
                foreground.await
            }
        };
        main.cancel();

        let teardown = self.stop_all(&ctx, &procs).await;
        result.and(teardown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::process::State;
    use crate::runnable::RunnableFn;
    use crate::runnable::probe::{Journal, broken, recorder};

    fn failing_after(name: &'static str, delay: Duration, journal: &Journal) -> RunnableRef {
        let journal = journal.clone();
        RunnableFn::arc(name, move |_ctx: CancellationToken, _callback: Callback| {
            let journal = journal.clone();
            async move {
                tokio::time::sleep(delay).await;
                journal.push(format!("start:{name}"));
                Err::<(), _>(Error::fail(name))
            }
        })
    }

    /// Becomes ready only once `gate` opens.
    fn gated(name: &'static str, gate: &CancellationToken, journal: &Journal) -> RunnableRef {
        let journal = journal.clone();
        let gate = gate.clone();
        RunnableFn::arc(name, move |ctx: CancellationToken, callback: Callback| {
            let journal = journal.clone();
            let gate = gate.clone();
            async move {
                tokio::select! {
                    _ = gate.cancelled() => {}
                    _ = ctx.cancelled() => return Ok(()),
                }
                journal.push(format!("start:{name}"));
                callback.call(ctx).await
            }
        })
    }

    fn crashing_after(delay: Duration) -> RunnableRef {
        RunnableFn::arc("crashing", move |ctx: CancellationToken, callback: Callback| async move {
            tokio::select! {
                res = callback.call(ctx) => res,
                _ = tokio::time::sleep(delay) => Err(Error::fail("crashed")),
            }
        })
    }

    #[tokio::test]
    async fn parallel_starts_all_then_tears_down_after_callback() {
        let journal = Journal::default();
        let group = parallel([recorder("a", &journal), recorder("b", &journal)]);
        assert_eq!(group.name(), "parallel(a, b)");

        let root = CancellationToken::new();
        let seen = journal.clone();
        group
            .run(
                root,
                Callback::new(move |_ctx| async move {
                    let mut started = seen.take();
                    started.sort();
                    assert_eq!(started, vec!["start:a", "start:b"]);
                    Ok(())
                }),
            )
            .await
            .unwrap();

        let mut stopped = journal.take();
        stopped.sort();
        assert_eq!(stopped, vec!["stop:a", "stop:b"]);
    }

    #[tokio::test]
    async fn sequential_rollback_stops_prefix_and_skips_rest() {
        let journal = Journal::default();
        let group = sequential([
            recorder("a", &journal),
            broken("b", &journal),
            recorder("c", &journal),
        ]);

        let root = CancellationToken::new();
        let p = Process::new(&root, group);
        let err = p.start(&root).await.unwrap_err();

        assert!(matches!(err.root(), Error::Fail { error } if error == "b"));
        assert_eq!(p.state(), State::Stopped);
        assert_eq!(journal.take(), vec!["start:a", "start:b", "stop:a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_rollback_reports_only_the_failing_member() {
        let journal = Journal::default();
        let gate = CancellationToken::new();
        let group = parallel([
            recorder("a", &journal),
            failing_after("b", Duration::from_millis(10), &journal),
            gated("c", &gate, &journal),
        ]);

        let root = CancellationToken::new();
        let called = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&called);
        let err = group
            .run(
                root,
                Callback::new(move |_ctx| async move {
                    flag.store(true, std::sync::atomic::Ordering::SeqCst);
                    Ok(())
                }),
            )
            .await
            .unwrap_err();

        assert!(!called.load(std::sync::atomic::Ordering::SeqCst));
        let Error::Startup { source } = &err else {
            panic!("expected b's startup failure, got {err:?}");
        };
        assert!(matches!(&**source, Error::Fail { error } if error == "b"));
        assert_eq!(journal.take(), vec!["start:a", "start:b", "stop:a"]);
    }

    #[tokio::test]
    async fn parallel_start_under_cancelled_parent_is_not_masked() {
        let journal = Journal::default();
        let gate = CancellationToken::new();
        let group = parallel([gated("a", &gate, &journal), gated("b", &gate, &journal)]);

        let root = CancellationToken::new();
        root.cancel();
        assert!(group.run(root, Callback::noop()).await.is_err());
        assert!(journal.take().is_empty());
    }

    #[tokio::test]
    async fn sequential_stops_in_list_order() {
        let journal = Journal::default();
        let group = sequential([
            recorder("a", &journal),
            recorder("b", &journal),
            recorder("c", &journal),
        ]);

        let root = CancellationToken::new();
        group.run(root, Callback::noop()).await.unwrap();
        assert_eq!(
            journal.take(),
            vec!["start:a", "start:b", "start:c", "stop:a", "stop:b", "stop:c"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn child_exit_interrupts_callback_and_surfaces_in_teardown() {
        let journal = Journal::default();
        let group = parallel([recorder("steady", &journal), crashing_after(Duration::from_millis(20))]);

        let root = CancellationToken::new();
        let err = group.run(root, Callback::until_cancelled()).await.unwrap_err();

        assert!(matches!(err.root(), Error::Fail { error } if error == "crashed"));
        assert_eq!(journal.take(), vec!["start:steady", "stop:steady"]);
    }

    #[tokio::test]
    async fn callback_error_takes_precedence_over_teardown() {
        let group = parallel([RunnableFn::arc(
            "dirty",
            |ctx: CancellationToken, callback: Callback| async move {
                callback.call(ctx).await?;
                Err::<(), _>(Error::fail("cleanup failed"))
            },
        ) as RunnableRef]);

        let root = CancellationToken::new();
        let err = group
            .run(root, Callback::new(|_ctx| async { Err(Error::fail("foreground")) }))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fail { ref error } if error == "foreground"));
    }

    #[tokio::test]
    async fn teardown_error_returned_when_callback_succeeds() {
        let group = sequential([RunnableFn::arc(
            "dirty",
            |ctx: CancellationToken, callback: Callback| async move {
                callback.call(ctx).await?;
                Err::<(), _>(Error::fail("cleanup failed"))
            },
        ) as RunnableRef]);

        let root = CancellationToken::new();
        let err = group.run(root, Callback::noop()).await.unwrap_err();
        assert!(matches!(err.root(), Error::Fail { error } if error == "cleanup failed"));
    }

    #[tokio::test]
    async fn empty_group_only_runs_callback() {
        let root = CancellationToken::new();
        parallel(Vec::new()).run(root.clone(), Callback::noop()).await.unwrap();
        sequential(Vec::new()).run(root, Callback::noop()).await.unwrap();
    }
}
