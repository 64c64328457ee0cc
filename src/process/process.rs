//! # Process: lifecycle state machine around one runnable.
//!
//! A [`Process`] owns a single execution of a [`Runnable`]. It spawns the execution
//! on [`start`](Process::start), promotes itself to `Running` when the runnable's
//! callback fires, and drives graceful or forced shutdown on [`stop`](Process::stop).
//!
//! ## Transitions
//! ```text
//! | From     | start()              | stop()                    | spontaneous                   |
//! |----------|----------------------|---------------------------|-------------------------------|
//! | Initial  | → Starting (spawn)   | → Stopped (never runs)    | -                             |
//! | Starting | invalid state        | → Stopped (cancel scope)  | → Running / → Stopped (exit)  |
//! | Running  | invalid state        | → Stopped (graceful)      | → Stopped (exit)              |
//! | Stopped  | invalid state        | invalid state             | -                             |
//! ```
//!
//! ## Signals
//! - **scope**: child of the parent token; cancelling it forces the runnable down;
//! - **stop requested**: makes the readiness callback return (graceful path);
//! - **terminated**: latched once the runnable returned and its error was captured.
//!
//! ## Bounds
//! The token passed to `start` only bounds the startup wait; the token passed to `stop`
//! only bounds the graceful wait. Neither outlives the call.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, panic_message};
use crate::process::State;
use crate::runnable::{Callback, RunnableRef};

/// Handle to one supervised execution of a runnable.
///
/// Cloning the handle is cheap; all clones observe the same process.
#[derive(Clone)]
pub struct Process {
    inner: Arc<Inner>,
}

struct Inner {
    runnable: RunnableRef,
    state: watch::Sender<State>,
    scope: CancellationToken,
    stop_requested: CancellationToken,
    terminated: CancellationToken,
    err: OnceLock<Error>,
}

impl Process {
    /// Creates a process bound to `parent`; cancelling `parent` forces it down.
    pub fn new(parent: &CancellationToken, runnable: RunnableRef) -> Self {
        let (state, _) = watch::channel(State::Initial);
        Self {
            inner: Arc::new(Inner {
                runnable,
                state,
                scope: parent.child_token(),
                stop_requested: CancellationToken::new(),
                terminated: CancellationToken::new(),
                err: OnceLock::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.runnable.name()
    }

    pub fn runnable(&self) -> &RunnableRef {
        &self.inner.runnable
    }

    /// Current state.
    pub fn state(&self) -> State {
        *self.inner.state.borrow()
    }

    /// Terminal error of the runnable, once it has terminated with one.
    pub fn err(&self) -> Option<Error> {
        self.inner.err.get().cloned()
    }

    /// Completes once the execution has terminated (or was prevented by an early stop).
    pub fn done(&self) -> impl Future<Output = ()> + Send + 'static {
        self.inner.terminated.clone().cancelled_owned()
    }

    /// `true` once [`done`](Self::done) would complete immediately.
    pub fn is_done(&self) -> bool {
        self.inner.terminated.is_cancelled()
    }

    /// Starts the runnable and waits until it is running.
    ///
    /// ### Errors
    /// - [`Error::InvalidState`] when not called from `Initial`;
    /// - [`Error::Startup`] when the runnable terminated before it became ready;
    /// - [`Error::Canceled`] when `bound` was cancelled first (startup is aborted and
    ///   the execution has terminated by the time this returns).
    pub async fn start(&self, bound: &CancellationToken) -> Result<(), Error> {
        self.transition("start", |s| (s == State::Initial).then_some(State::Starting))?;

        let mut rx = self.inner.state.subscribe();
        tokio::spawn(Arc::clone(&self.inner).execute());

        let reached = tokio::select! {
            res = async {
                rx.wait_for(|s| matches!(s, State::Running | State::Stopped)).await.map(|s| *s)
            } => res.unwrap_or(State::Stopped),
            _ = bound.cancelled() => {
                debug!(process = self.name(), "startup aborted by caller");
                self.inner.scope.cancel();
                self.inner.terminated.cancelled().await;
                return Err(Error::Canceled);
            }
        };

        if reached == State::Running {
            return Ok(());
        }

        self.inner.terminated.cancelled().await;
        let cause = match self.err() {
            Some(err) => err,
            None if self.inner.stop_requested.is_cancelled() => Error::Canceled,
            None => Error::ExitedBeforeReady,
        };
        Err(Error::Startup {
            source: Box::new(cause),
        })
    }

    /// Stops the process.
    ///
    /// - from `Initial`: startup is prevented for good, returns `Ok`;
    /// - from `Starting`: the scope is cancelled and startup is aborted;
    /// - from `Running`: stop is signalled and the runnable may exit on its own;
    ///   if `bound` is cancelled first, the scope is cancelled (forced shutdown).
    ///
    /// ### Errors
    /// - [`Error::InvalidState`] when already `Stopped` (including a concurrent second stop);
    /// - [`Error::Execution`] wrapping the runnable's terminal error.
    pub async fn stop(&self, bound: &CancellationToken) -> Result<(), Error> {
        let prev = self.transition("stop", |s| (s != State::Stopped).then_some(State::Stopped))?;
        self.inner.stop_requested.cancel();

        match prev {
            State::Initial => {
                self.inner.terminated.cancel();
                return Ok(());
            }
            State::Starting => self.inner.scope.cancel(),
            State::Running => {
                tokio::select! {
                    _ = self.inner.terminated.cancelled() => {}
                    _ = bound.cancelled() => {
                        debug!(process = self.name(), "graceful stop expired, forcing");
                        self.inner.scope.cancel();
                    }
                }
            }
            State::Stopped => {}
        }

        self.inner.terminated.cancelled().await;
        self.terminal_result()
    }

    /// Stops the process if it is still live; otherwise waits for termination.
    ///
    /// Either way, returns the runnable's terminal error wrapped in [`Error::Execution`].
    /// Used by groups and the supervisor, which must attempt a stop regardless of
    /// whether the process already exited on its own.
    pub async fn ensure_stopped(&self, bound: &CancellationToken) -> Result<(), Error> {
        match self.stop(bound).await {
            Err(Error::InvalidState { .. }) => {
                self.done().await;
                self.terminal_result()
            }
            other => other,
        }
    }

    fn terminal_result(&self) -> Result<(), Error> {
        match self.err() {
            Some(err) => Err(Error::Execution {
                source: Box::new(err),
            }),
            None => Ok(()),
        }
    }

    /// Applies `next` atomically; returns the previous state on success.
    fn transition(
        &self,
        op: &'static str,
        next: impl FnOnce(State) -> Option<State>,
    ) -> Result<State, Error> {
        let mut outcome = Err(State::Initial);
        self.inner.state.send_if_modified(|s| match next(*s) {
            Some(to) => {
                outcome = Ok(*s);
                *s = to;
                true
            }
            None => {
                outcome = Err(*s);
                false
            }
        });
        outcome.map_err(|state| Error::InvalidState { op, state })
    }
}

impl Inner {
    /// Runs the runnable to completion and latches the terminal state.
    async fn execute(self: Arc<Self>) {
        let callback = self.callback();
        let run = self.runnable.run(self.scope.clone(), callback);

        let res = match AssertUnwindSafe(run).catch_unwind().await {
            Ok(res) => res,
            Err(payload) => Err(Error::Panicked {
                info: panic_message(&*payload),
            }),
        };
        if let Err(err) = res {
            debug!(process = self.runnable.name(), error = %err, "runnable terminated with error");
            let _ = self.err.set(err);
        }

        self.state.send_replace(State::Stopped);
        self.scope.cancel();
        self.terminated.cancel();
    }

    /// Readiness callback: promotes `Starting → Running`, then holds until stop.
    fn callback(self: &Arc<Self>) -> Callback {
        let inner = Arc::clone(self);
        Callback::new(move |ctx: CancellationToken| async move {
            let promoted = inner.state.send_if_modified(|s| {
                if *s == State::Starting {
                    *s = State::Running;
                    true
                } else {
                    false
                }
            });
            if promoted {
                tokio::select! {
                    _ = inner.stop_requested.cancelled() => {}
                    _ = inner.scope.cancelled() => {}
                    _ = ctx.cancelled() => {}
                }
            }
            Ok(())
        })
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("name", &self.name())
            .field("state", &self.state())
            .field("err", &self.inner.err.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::runnable::RunnableFn;

    fn serving() -> RunnableRef {
        RunnableFn::arc("serving", |ctx: CancellationToken, callback: Callback| async move {
            callback.call(ctx).await
        })
    }

    fn failing_at_startup() -> RunnableRef {
        RunnableFn::arc("broken", |_ctx: CancellationToken, _callback: Callback| async move {
            Err::<(), _>(Error::fail("bind failed"))
        })
    }

    #[tokio::test]
    async fn start_reaches_running_and_stop_is_graceful() {
        let root = CancellationToken::new();
        let p = Process::new(&root, serving());
        assert_eq!(p.state(), State::Initial);

        p.start(&root).await.unwrap();
        assert_eq!(p.state(), State::Running);

        p.stop(&root).await.unwrap();
        assert_eq!(p.state(), State::Stopped);
        assert!(p.is_done());
        assert!(p.err().is_none());
    }

    #[tokio::test]
    async fn second_start_is_invalid_and_does_not_change_state() {
        let root = CancellationToken::new();
        let p = Process::new(&root, serving());
        p.start(&root).await.unwrap();

        let err = p.start(&root).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { op: "start", state: State::Running }));
        assert_eq!(p.state(), State::Running);

        p.stop(&root).await.unwrap();
    }

    #[tokio::test]
    async fn stop_from_initial_prevents_start_for_good() {
        let root = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let p = Process::new(
            &root,
            RunnableFn::arc("counted", move |ctx: CancellationToken, callback: Callback| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { callback.call(ctx).await }
            }),
        );

        p.stop(&root).await.unwrap();
        assert_eq!(p.state(), State::Stopped);
        assert!(p.is_done());

        let err = p.stop(&root).await.unwrap_err();
        assert!(err.is_invalid_state());

        let err = p.start(&root).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { op: "start", state: State::Stopped }));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn startup_failure_is_wrapped_and_kept() {
        let root = CancellationToken::new();
        let p = Process::new(&root, failing_at_startup());

        let err = p.start(&root).await.unwrap_err();
        assert!(matches!(err, Error::Startup { .. }));
        assert!(matches!(err.root(), Error::Fail { error } if error == "bind failed"));
        assert_eq!(p.state(), State::Stopped);

        // readable any number of times
        assert!(p.err().is_some());
        assert!(p.err().is_some());
    }

    #[tokio::test]
    async fn exit_without_callback_is_a_startup_failure() {
        let root = CancellationToken::new();
        let p = Process::new(
            &root,
            RunnableFn::arc("quiet", |_ctx: CancellationToken, _callback: Callback| async {
                Ok::<(), Error>(())
            }),
        );

        let err = p.start(&root).await.unwrap_err();
        assert!(matches!(err.root(), Error::ExitedBeforeReady));
        assert!(p.err().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_after_running_surfaces_from_stop_and_err() {
        let root = CancellationToken::new();
        let p = Process::new(
            &root,
            RunnableFn::arc("crashy", |ctx: CancellationToken, callback: Callback| async move {
                tokio::select! {
                    res = callback.call(ctx) => res,
                    _ = tokio::time::sleep(Duration::from_millis(50)) => Err(Error::fail("crashed")),
                }
            }),
        );

        p.start(&root).await.unwrap();
        p.done().await;
        assert_eq!(p.state(), State::Stopped);
        assert!(matches!(p.err(), Some(Error::Fail { .. })));

        let err = p.ensure_stopped(&root).await.unwrap_err();
        assert!(matches!(err, Error::Execution { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_bound_aborts_startup() {
        let root = CancellationToken::new();
        let p = Process::new(
            &root,
            RunnableFn::arc("slow", |ctx: CancellationToken, callback: Callback| async move {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(3600)) => {}
                    _ = ctx.cancelled() => return Ok(()),
                }
                callback.call(ctx).await
            }),
        );

        let bound = CancellationToken::new();
        let trigger = bound.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = p.start(&bound).await.unwrap_err();
        assert!(matches!(err, Error::Canceled));
        assert!(p.is_done());
        assert_eq!(p.state(), State::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_startup_cancels_it() {
        let root = CancellationToken::new();
        let p = Process::new(
            &root,
            RunnableFn::arc("slow", |ctx: CancellationToken, callback: Callback| async move {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(3600)) => {}
                    _ = ctx.cancelled() => return Ok(()),
                }
                callback.call(ctx).await
            }),
        );

        let starter = p.clone();
        let bound = root.clone();
        let start = tokio::spawn(async move { starter.start(&bound).await });

        let mut rx = p.inner.state.subscribe();
        rx.wait_for(|s| *s == State::Starting).await.unwrap();
        p.stop(&root).await.unwrap();

        let err = start.await.unwrap().unwrap_err();
        assert!(matches!(err.root(), Error::Canceled));
        assert_eq!(p.state(), State::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_stop_bound_forces_shutdown() {
        let root = CancellationToken::new();
        let p = Process::new(
            &root,
            RunnableFn::arc("stubborn", |ctx: CancellationToken, callback: Callback| async move {
                callback.call(ctx.clone()).await?;
                // slow cleanup, only interrupted by cancellation
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(3600)) => {}
                    _ = ctx.cancelled() => {}
                }
                Ok::<(), Error>(())
            }),
        );
        p.start(&root).await.unwrap();

        let bound = CancellationToken::new();
        let trigger = bound.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        p.stop(&bound).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(3600));
        assert!(p.is_done());
    }

    #[tokio::test]
    async fn panic_is_captured_as_terminal_error() {
        let root = CancellationToken::new();
        let p = Process::new(
            &root,
            RunnableFn::arc("panicky", |_ctx: CancellationToken, _callback: Callback| async move {
                if true {
                    panic!("kaboom");
                }
                Ok::<(), Error>(())
            }),
        );

        let err = p.start(&root).await.unwrap_err();
        assert!(matches!(err.root(), Error::Panicked { info } if info == "kaboom"));
    }

    #[tokio::test]
    async fn parent_cancellation_forces_running_process_down() {
        let root = CancellationToken::new();
        let p = Process::new(&root, serving());
        p.start(&root).await.unwrap();

        root.cancel();
        p.done().await;
        assert_eq!(p.state(), State::Stopped);
    }

    #[tokio::test]
    async fn concurrent_stops_have_exactly_one_winner() {
        let root = CancellationToken::new();
        let p = Process::new(&root, serving());
        p.start(&root).await.unwrap();

        let (a, b) = tokio::join!(p.stop(&root), p.stop(&root));
        let oks = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(oks, 1);
        assert!(a.err().or(b.err()).is_some_and(|e| e.is_invalid_state()));
    }

    #[tokio::test]
    async fn lifecycle_calls_run_on_spawned_tasks() {
        let root = CancellationToken::new();
        let p = Process::new(&root, serving());

        let starter = p.clone();
        let bound = root.clone();
        tokio::spawn(async move { starter.start(&bound).await })
            .await
            .unwrap()
            .unwrap();

        let stopper = p.clone();
        let bound = root.clone();
        tokio::spawn(async move { stopper.ensure_stopped(&bound).await })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(p.state(), State::Stopped);
    }
}
