//! Supervisor core.
//!
//! - [`Supervisor`] keyed processes reconciled against a [`Table`](crate::Table);
//! - [`SupervisorBuilder`] / [`SupervisorConfig`] construction and tuning;
//! - [`Supervised`] handle to one live process.
//!
//! ## Wiring
//! ```text
//!  Table ──iter/get──► Supervisor ──Process::new/start──► live map (DashMap<K, Slot>)
//!                        │   ▲                               │
//!                        │   └── watchdog (per process) ◄────┘ done → remove
//!                        ├─► reconcile_loop (Clock timer)
//!                        └─► Bus ──► listener ──► SubscriberSet ──► Subscribe impls
//! ```

mod builder;
mod config;
mod entry;
mod reconcile;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use entry::Supervised;
pub use supervisor::{Key, Supervisor};
