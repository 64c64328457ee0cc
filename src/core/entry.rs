//! Live-map slots and the public handle to a supervised process.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Error;
use crate::process::{Process, State};

/// Value stored under a key in the live map.
///
/// `Reserved` is inserted before the table is even consulted, so concurrent starts of
/// one key race on the reservation only.
pub(crate) enum Slot<R> {
    Reserved,
    Live(Arc<Entry<R>>),
}

impl<R> Slot<R> {
    pub(crate) fn live(&self) -> Option<Arc<Entry<R>>> {
        match self {
            Slot::Reserved => None,
            Slot::Live(entry) => Some(Arc::clone(entry)),
        }
    }

    pub(crate) fn holds(&self, entry: &Arc<Entry<R>>) -> bool {
        matches!(self, Slot::Live(e) if Arc::ptr_eq(e, entry))
    }
}

pub(crate) struct Entry<R> {
    pub(crate) runnable: R,
    pub(crate) process: Process,
    removed: AtomicBool,
}

impl<R> Entry<R> {
    pub(crate) fn new(runnable: R, process: Process) -> Self {
        Self {
            runnable,
            process,
            removed: AtomicBool::new(false),
        }
    }

    /// Claims the removal; `true` for exactly one caller.
    pub(crate) fn claim_removal(&self) -> bool {
        !self.removed.swap(true, Ordering::AcqRel)
    }
}

/// Handle to a process owned by a [`Supervisor`](crate::Supervisor).
///
/// Holding it does not keep the process in the live set; it only observes it.
#[derive(Clone)]
pub struct Supervised<K, R> {
    key: K,
    runnable: R,
    process: Process,
}

impl<K, R: Clone> Supervised<K, R> {
    pub(crate) fn new(key: K, entry: &Entry<R>) -> Self {
        Self {
            key,
            runnable: entry.runnable.clone(),
            process: entry.process.clone(),
        }
    }
}

impl<K, R> Supervised<K, R> {
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The value read from the table for this key.
    pub fn runnable(&self) -> &R {
        &self.runnable
    }

    pub fn process(&self) -> &Process {
        &self.process
    }

    pub fn state(&self) -> State {
        self.process.state()
    }

    pub fn err(&self) -> Option<Error> {
        self.process.err()
    }

    pub fn done(&self) -> impl Future<Output = ()> + Send + 'static {
        self.process.done()
    }
}

impl<K: fmt::Debug, R> fmt::Debug for Supervised<K, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervised")
            .field("key", &self.key)
            .field("process", &self.process)
            .finish_non_exhaustive()
    }
}
