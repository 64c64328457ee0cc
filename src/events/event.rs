//! # Lifecycle events published by the supervisor.
//!
//! ```text
//! run:       SupervisorStarted ─► RestoreFinished ─► ... ─► ShutdownRequested ─► AllStopped
//! per key:   ProcessStarting ─► ProcessRunning ─► ProcessStopped | ProcessFailed
//!                         └──► StartFailed
//! loop:      ReconcileFailed (table iteration error or failed restart)
//! ```
//!
//! Every event carries a process-wide monotonic `seq`; use it to restore order when
//! events are observed through different receivers.
//!
//! ## Example
//! ```rust
//! use procvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::StartFailed)
//!     .with_key("worker-1")
//!     .with_reason("bind failed");
//!
//! assert_eq!(ev.key.as_deref(), Some("worker-1"));
//! assert_eq!(ev.kind.as_str(), "start_failed");
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of supervisor events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `run` opened the gate; start/stop calls are accepted.
    SupervisorStarted,
    /// The initial restoration pass finished or its wait expired.
    RestoreFinished,
    /// A key was reserved and its process is starting.
    ProcessStarting,
    /// A process reached `Running`.
    ProcessRunning,
    /// A process failed to start; `reason` holds the error.
    StartFailed,
    /// A process terminated without error and left the live set.
    ProcessStopped,
    /// A process terminated with an error and left the live set.
    ProcessFailed,
    /// A reconciliation pass hit an error; the loop keeps going.
    ReconcileFailed,
    /// The callback returned; shutdown begins.
    ShutdownRequested,
    /// Every live process stopped and background work drained.
    AllStopped,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SupervisorStarted => "supervisor_started",
            EventKind::RestoreFinished => "restore_finished",
            EventKind::ProcessStarting => "process_starting",
            EventKind::ProcessRunning => "process_running",
            EventKind::StartFailed => "start_failed",
            EventKind::ProcessStopped => "process_stopped",
            EventKind::ProcessFailed => "process_failed",
            EventKind::ReconcileFailed => "reconcile_failed",
            EventKind::ShutdownRequested => "shutdown_requested",
            EventKind::AllStopped => "all_stopped",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supervisor event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Process-wide monotonic sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    pub kind: EventKind,
    /// Debug rendering of the key, for per-key events.
    pub key: Option<Arc<str>>,
    /// Error message or other detail.
    pub reason: Option<Arc<str>>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, Ordering::Relaxed),
            at: SystemTime::now(),
            kind,
            key: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Per-key event; the key is rendered with `Debug`.
    pub(crate) fn for_key(kind: EventKind, key: &impl fmt::Debug) -> Self {
        Self::new(kind).with_key(format!("{key:?}"))
    }
}
