//! # procvisor
//!
//! **Procvisor** is a process supervision core for tokio applications.
//!
//! It runs long-lived units ("runnables") behind a race-free lifecycle state machine,
//! composes them into startup/shutdown groups with deterministic ordering, and
//! supervises a keyed, externally stored set of them with self-healing restarts.
//!
//! ## Architecture
//! ```text
//!        ┌───────────────┐       ┌──────────────────────────────────────────────┐
//!        │ Table<K, R>   │◄─iter─┤ Supervisor<K, R>                             │
//!        │ (desired set) │──get─►│  - gate (RwLock)    - live map (DashMap)     │
//!        └───────────────┘       │  - reconcile loop   - watchdogs (TaskTracker)│
//!                                │  - Bus ──► SubscriberSet ──► Subscribe impls │
//!                                └──────────────┬───────────────────────────────┘
//!                                               │ one per live key
//!                                               ▼
//!                                ┌──────────────────────────────┐
//!                                │ Process                      │
//!                                │ Initial → Starting → Running │
//!                                │        └──────────┴→ Stopped │
//!                                └──────────────┬───────────────┘
//!                                               │ run(ctx, callback)
//!                                               ▼
//!                 Runnable  =  RunnableFn | chain(..) | parallel(..) | sequential(..) | Retry
//! ```
//!
//! ### Runnable contract
//! ```text
//! run(ctx, callback)
//!   ├─► initialize
//!   ├─► callback.call(ctx)   ← readiness; returns when the unit should shut down
//!   ├─► cleanup
//!   └─► Ok / Err
//! ```
//!
//! ## Features
//! | Area            | Description                                                  | Key types / functions                          |
//! |-----------------|--------------------------------------------------------------|------------------------------------------------|
//! | **Units**       | Long-lived, cancellable units with a readiness callback.     | [`Runnable`], [`Callback`], [`RunnableFn`]     |
//! | **Lifecycle**   | Start/stop state machine with bounded waits.                 | [`Process`], [`State`]                         |
//! | **Composition** | Nested, concurrent and ordered startup/shutdown groups.      | [`chain`], [`parallel`], [`sequential`]        |
//! | **Restarts**    | Restart one unit under restart/backoff/jitter policies.      | [`Retry`], [`RestartPolicy`], [`BackoffPolicy`]|
//! | **Task batches**| Fallible batches under a cancellation policy.                | [`tasks::sequential`], [`tasks::parallel`]     |
//! | **Supervision** | Keyed processes reconciled against a table.                  | [`Supervisor`], [`Table`], [`MemoryTable`]     |
//! | **Time**        | Injectable clock with a deterministic fake.                  | [`Clock`], [`TokioClock`], [`FakeClock`]       |
//! | **Events**      | Lifecycle events and subscribers.                            | [`Event`], [`Subscribe`], [`LogWriter`]        |
//! | **Errors**      | One error taxonomy for everything above.                     | [`Error`], [`Errors`]                          |
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use procvisor::{Callback, MemoryTable, Runnable, RunnableFn, RunnableRef, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), procvisor::Error> {
//!     let table: MemoryTable<&'static str, RunnableRef> = MemoryTable::new();
//!     table.insert(
//!         "worker",
//!         RunnableFn::arc("worker", |ctx: CancellationToken, callback: Callback| async move {
//!             // open resources...
//!             callback.call(ctx).await
//!             // release resources...
//!         }),
//!     );
//!
//!     let supervisor = Supervisor::new(table);
//!     let handle = supervisor.clone();
//!     supervisor
//!         .run(
//!             CancellationToken::new(),
//!             Callback::new(move |_ctx| async move {
//!                 // restored by the initial pass
//!                 assert!(handle.get(&"worker").is_ok());
//!                 Ok(())
//!             }),
//!         )
//!         .await
//! }
//! ```

pub mod clock;
mod core;
mod error;
pub mod events;
pub mod policies;
mod process;
mod runnable;
pub mod subscribers;
pub mod table;
pub mod tasks;

// ---- Public re-exports ----

pub use clock::{Clock, ClockRef, FakeClock, Timer, TokioClock};
pub use crate::core::{Key, Supervised, Supervisor, SupervisorBuilder, SupervisorConfig};
pub use error::{Error, Errors};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy, RestartPolicy};
pub use process::{Process, State};
pub use runnable::{Callback, Retry, Runnable, RunnableFn, RunnableRef, chain, parallel, sequential};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use table::{Cursor, MemoryTable, SnapshotCursor, Table, TableRef};
pub use tasks::CancelPolicy;
