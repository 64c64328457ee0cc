//! # Supervisor: keyed processes reconciled against a table.
//!
//! The [`Supervisor`] owns a live map `key → Process`. Keys enter the map through
//! [`start`](Supervisor::start) (explicit, or issued by the reconciliation loop) and
//! leave it through [`stop`](Supervisor::stop) or when their process terminates
//! (a per-process watchdog removes it).
//!
//! ## Lifecycle
//! ```text
//! run(ctx, callback)
//!   ├─► open gate                      (start/stop accepted from here on)
//!   ├─► restoration pass               (start every table key, wait ≤ restore_wait)
//!   ├─► spawn reconciliation loop      (every restart_interval: start missing keys)
//!   ├─► callback(ctx)
//!   └─► close:
//!         ├─ stop loop and in-flight restarts
//!         ├─ close gate                (new start/stop → NotRunning)
//!         ├─ stop every live process   (concurrently, bounded by ctx)
//!         └─ drain watchdogs           (no background task outlives run)
//! ```
//!
//! ## Per-key guarantees
//! - at most one live entry per key: a `Reserved` slot is inserted before the table
//!   is consulted, so concurrent starts race on the reservation only;
//! - removal happens once: explicit stop and the watchdog both claim the entry's
//!   removal flag, the loser backs off;
//! - a failed start or stop always leaves the key free for a fresh start;
//! - start and stop run as tracked tasks, so dropping the caller's future never
//!   strands a key without its watchdog.
//!
//! ## Gate
//! `RwLock<Option<Running>>`: every start/stop task holds it for read, `run` takes
//! it for write only to open and to close. Once closing has the write lock, no new
//! process can be started.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio::sync::{OwnedRwLockReadGuard, RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::clock::ClockRef;
use crate::core::entry::{Entry, Slot, Supervised};
use crate::core::{SupervisorBuilder, SupervisorConfig};
use crate::error::Error;
use crate::events::{Bus, Event, EventKind};
use crate::process::{Process, State};
use crate::runnable::{Callback, Runnable};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::table::{Table, TableRef};
use crate::tasks::{self, CancelPolicy};

/// Bounds required of supervisor keys.
pub trait Key: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> Key for T where T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

/// Supervises processes keyed by `K`, built from runnables `R` read from a table.
///
/// Cloning is cheap; clones share the same live map and lifecycle.
pub struct Supervisor<K, R> {
    pub(crate) shared: Arc<Shared<K, R>>,
}

pub(crate) struct Shared<K, R> {
    pub(crate) cfg: SupervisorConfig,
    pub(crate) table: TableRef<K, R>,
    pub(crate) clock: ClockRef,
    pub(crate) entries: DashMap<K, Slot<R>>,
    pub(crate) gate: Arc<RwLock<Option<Running>>>,
    pub(crate) bus: Bus,
    pub(crate) subscribers: Vec<Arc<dyn Subscribe>>,
}

/// Read access to the gate, held by every start and stop until it completes.
type Gate = OwnedRwLockReadGuard<Option<Running>>;

/// Handles valid while `run` is active.
#[derive(Clone)]
pub(crate) struct Running {
    /// Parent of every process started during this run.
    pub(crate) scope: CancellationToken,
    /// Reconciliation loop and in-flight restarts; cancelled first on close.
    pub(crate) background: CancellationToken,
    /// Watchdogs, restarts and the loop.
    pub(crate) tracker: TaskTracker,
}

impl<K, R> Clone for Supervisor<K, R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K: Key, R: Runnable + Clone> Supervisor<K, R> {
    /// Supervisor over `table` with default configuration and a [`TokioClock`](crate::TokioClock).
    pub fn new(table: impl Table<K, R>) -> Self {
        SupervisorBuilder::new(table).build()
    }

    pub fn builder(table: impl Table<K, R>) -> SupervisorBuilder<K, R> {
        SupervisorBuilder::new(table)
    }

    pub(crate) fn from_shared(shared: Arc<Shared<K, R>>) -> Self {
        Self { shared }
    }

    /// Starts the process for `key` and waits until it is running.
    ///
    /// `bound` only bounds the startup wait. The start is carried out by a tracked
    /// task: dropping the returned future detaches the caller but the task still
    /// either installs the watchdog or frees the key.
    ///
    /// ### Errors
    /// - [`Error::NotRunning`] when `run` is not active;
    /// - [`Error::AlreadyExists`] when the key is live or being started;
    /// - the table's error when the lookup fails ([`Error::NotFound`] for missing keys);
    /// - [`Error::Startup`] / [`Error::Canceled`] from [`Process::start`].
    pub async fn start(&self, bound: &CancellationToken, key: K) -> Result<Supervised<K, R>, Error> {
        let gate = Arc::clone(&self.shared.gate).read_owned().await;
        let tracker = gate.as_ref().ok_or_else(supervisor_not_running)?.tracker.clone();
        joined(tracker.spawn(self.clone().admit(gate, bound.clone(), key))).await
    }

    async fn admit(self, gate: Gate, bound: CancellationToken, key: K) -> Result<Supervised<K, R>, Error> {
        let running = gate.as_ref().ok_or_else(supervisor_not_running)?;

        match self.shared.entries.entry(key.clone()) {
            MapEntry::Occupied(_) => return Err(Error::already_exists(&key)),
            MapEntry::Vacant(slot) => {
                slot.insert(Slot::Reserved);
            }
        }

        let runnable = match self.shared.table.get(&key).await {
            Ok(runnable) => runnable,
            Err(err) => {
                self.shared
                    .entries
                    .remove_if(&key, |_, slot| matches!(slot, Slot::Reserved));
                return Err(err);
            }
        };

        let process = Process::new(&running.scope, Arc::new(runnable.clone()));
        let entry = Arc::new(Entry::new(runnable, process.clone()));
        self.shared
            .entries
            .insert(key.clone(), Slot::Live(Arc::clone(&entry)));
        self.publish(Event::for_key(EventKind::ProcessStarting, &key));

        if let Err(err) = process.start(&bound).await {
            self.shared.release(&key, &entry);
            debug!(key = ?key, error = %err, "start failed");
            self.publish(Event::for_key(EventKind::StartFailed, &key).with_reason(err.to_string()));
            return Err(err);
        }

        debug!(key = ?key, process = process.name(), "process running");
        self.publish(Event::for_key(EventKind::ProcessRunning, &key));
        running.tracker.spawn(self.clone().watchdog(key.clone(), Arc::clone(&entry)));

        Ok(Supervised::new(key, &entry))
    }

    /// Removes `key` from the live set and stops its process.
    ///
    /// `bound` bounds the graceful wait; on expiry the process is forced down. Like
    /// [`start`](Self::start), the stop runs in a tracked task and completes even if
    /// the returned future is dropped.
    ///
    /// ### Errors
    /// - [`Error::NotRunning`] when `run` is not active;
    /// - [`Error::NotFound`] when the key is not live (including a concurrent second stop);
    /// - [`Error::Execution`] wrapping the process's terminal error. The key is
    ///   removed regardless.
    pub async fn stop(&self, bound: &CancellationToken, key: &K) -> Result<(), Error> {
        let gate = Arc::clone(&self.shared.gate).read_owned().await;
        let tracker = gate.as_ref().ok_or_else(supervisor_not_running)?.tracker.clone();
        joined(tracker.spawn(self.clone().dismiss(gate, bound.clone(), key.clone()))).await
    }

    async fn dismiss(self, _gate: Gate, bound: CancellationToken, key: K) -> Result<(), Error> {
        let entry = self
            .shared
            .entries
            .get(&key)
            .and_then(|slot| slot.live())
            .ok_or_else(|| Error::not_found(&key))?;
        if !self.shared.release(&key, &entry) {
            return Err(Error::not_found(&key));
        }

        let res = entry.process.ensure_stopped(&bound).await;
        self.publish_exit(&key, &entry.process);
        res
    }

    /// Returns the live process for `key` if it is running.
    ///
    /// ### Errors
    /// - [`Error::NotFound`] when the key is not live;
    /// - [`Error::NotRunning`] when it is live but not `Running` yet
    ///   (use [`entry`](Self::entry) to get the handle anyway).
    pub fn get(&self, key: &K) -> Result<Supervised<K, R>, Error> {
        let supervised = self.entry(key).ok_or_else(|| Error::not_found(key))?;
        if supervised.state() != State::Running {
            return Err(Error::not_running(key));
        }
        Ok(supervised)
    }

    /// Handle to the live process for `key`, whatever its state.
    pub fn entry(&self, key: &K) -> Option<Supervised<K, R>> {
        let entry = self.shared.entries.get(key).and_then(|slot| slot.live())?;
        Some(Supervised::new(key.clone(), &entry))
    }

    /// Keys with a live process (reservations excluded).
    pub fn keys(&self) -> Vec<K> {
        self.shared
            .entries
            .iter()
            .filter(|slot| matches!(slot.value(), Slot::Live(_)))
            .map(|slot| slot.key().clone())
            .collect()
    }

    /// `true` while `run` is active.
    pub async fn is_running(&self) -> bool {
        self.shared.gate.read().await.is_some()
    }

    /// Receiver for the supervisor's events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.bus.subscribe()
    }

    pub(crate) fn publish(&self, ev: Event) {
        self.shared.bus.publish(ev);
    }

    fn publish_exit(&self, key: &K, process: &Process) {
        let ev = match process.err() {
            Some(err) => Event::for_key(EventKind::ProcessFailed, key).with_reason(err.to_string()),
            None => Event::for_key(EventKind::ProcessStopped, key),
        };
        self.publish(ev);
    }

    /// Removes the entry once its process terminated, unless a stop got there first.
    async fn watchdog(self, key: K, entry: Arc<Entry<R>>) {
        entry.process.done().await;
        if self.shared.release(&key, &entry) {
            match entry.process.err() {
                Some(err) => warn!(key = ?key, error = %err, "process exited with error"),
                None => debug!(key = ?key, "process exited"),
            }
            self.publish_exit(&key, &entry.process);
        }
    }

    async fn open(&self, ctx: &CancellationToken) -> Result<Running, Error> {
        let mut gate = self.shared.gate.write().await;
        if gate.is_some() {
            return Err(Error::InvalidState {
                op: "run",
                state: State::Running,
            });
        }
        let scope = ctx.child_token();
        let running = Running {
            background: scope.child_token(),
            scope,
            tracker: TaskTracker::new(),
        };
        *gate = Some(running.clone());
        Ok(running)
    }

    async fn close(&self, running: &Running, ctx: &CancellationToken) {
        self.publish(Event::new(EventKind::ShutdownRequested));
        running.background.cancel();
        self.shared.gate.write().await.take();

        let live: Vec<(K, Arc<Entry<R>>)> = self
            .shared
            .entries
            .iter()
            .filter_map(|slot| slot.value().live().map(|entry| (slot.key().clone(), entry)))
            .collect();

        let stops = live
            .into_iter()
            .filter(|(key, entry)| self.shared.release(key, entry))
            .map(|(key, entry)| {
                let me = self.clone();
                move |bound: CancellationToken| async move {
                    let res = entry.process.ensure_stopped(&bound).await;
                    me.publish_exit(&key, &entry.process);
                    res
                }
            });
        if let Err(err) = tasks::parallel(ctx, CancelPolicy::Never, stops).await {
            warn!(error = %err, "processes failed during shutdown");
        }

        running.tracker.close();
        running.tracker.wait().await;
        running.scope.cancel();
        self.publish(Event::new(EventKind::AllStopped));
    }

    /// Forwards bus events to the subscribers until `AllStopped`.
    fn spawn_listener(&self) -> Option<JoinHandle<()>> {
        if self.shared.subscribers.is_empty() {
            return None;
        }
        let mut rx = self.shared.bus.subscribe();
        let subscribers = self.shared.subscribers.clone();

        Some(tokio::spawn(async move {
            let set = SubscriberSet::new(&subscribers);
            loop {
                match rx.recv().await {
                    Ok(ev) => {
                        let last = ev.kind == EventKind::AllStopped;
                        set.emit(ev);
                        if last {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            set.shutdown().await;
        }))
    }
}

impl<K: Key, R> Shared<K, R> {
    /// Claims `entry`'s removal and drops it from the live map; `true` for the winner.
    pub(crate) fn release(&self, key: &K, entry: &Arc<Entry<R>>) -> bool {
        if !entry.claim_removal() {
            return false;
        }
        self.entries.remove_if(key, |_, slot| slot.holds(entry));
        true
    }
}

/// Result of a tracked start or stop; a panic inside it surfaces as [`Error::Panicked`].
async fn joined<T>(handle: JoinHandle<Result<T, Error>>) -> Result<T, Error> {
    handle.await.unwrap_or_else(|err| {
        Err(Error::Panicked {
            info: err.to_string(),
        })
    })
}

fn supervisor_not_running() -> Error {
    Error::NotRunning {
        key: "supervisor".to_string(),
    }
}

#[async_trait]
impl<K: Key, R: Runnable + Clone> Runnable for Supervisor<K, R> {
    fn name(&self) -> &str {
        "supervisor"
    }

    /// Runs the supervisor until `callback` returns, then stops everything it started.
    ///
    /// ### Errors
    /// - [`Error::InvalidState`] (`op = "run"`) when another `run` is active;
    /// - the callback's error. Errors of processes stopped during shutdown are logged.
    async fn run(&self, ctx: CancellationToken, callback: Callback) -> Result<(), Error> {
        let running = self.open(&ctx).await?;
        let listener = self.spawn_listener();
        self.publish(Event::new(EventKind::SupervisorStarted));

        self.restore(&running).await;
        self.publish(Event::new(EventKind::RestoreFinished));
        running
            .tracker
            .spawn(self.clone().reconcile_loop(running.clone()));

        let result = callback.call(ctx.clone()).await;

        self.close(&running, &ctx).await;
        if let Some(listener) = listener {
            let _ = listener.await;
        }
        result
    }
}

impl<K: Key, R> fmt::Debug for Supervisor<K, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("cfg", &self.shared.cfg)
            .field("live", &self.shared.entries.len())
            .finish_non_exhaustive()
    }
}
