use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::clock::{ClockRef, TokioClock};
use crate::core::supervisor::{Key, Shared};
use crate::core::{Supervisor, SupervisorConfig};
use crate::events::Bus;
use crate::runnable::Runnable;
use crate::subscribers::Subscribe;
use crate::table::{Table, TableRef};

/// Builder for a [`Supervisor`].
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use procvisor::{LogWriter, MemoryTable, RunnableRef, Supervisor, SupervisorConfig};
///
/// let table: MemoryTable<String, RunnableRef> = MemoryTable::new();
/// let supervisor = Supervisor::builder(table.clone())
///     .with_config(SupervisorConfig {
///         restart_interval: Duration::from_secs(1),
///         ..SupervisorConfig::default()
///     })
///     .with_subscribers(vec![Arc::new(LogWriter)])
///     .build();
/// # let _ = supervisor;
/// ```
pub struct SupervisorBuilder<K, R> {
    table: TableRef<K, R>,
    cfg: SupervisorConfig,
    clock: Option<ClockRef>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl<K: Key, R: Runnable + Clone> SupervisorBuilder<K, R> {
    pub fn new(table: impl Table<K, R>) -> Self {
        Self::from_ref(Arc::new(table))
    }

    /// Same as [`new`](Self::new) for an already shared table.
    pub fn from_ref(table: TableRef<K, R>) -> Self {
        Self {
            table,
            cfg: SupervisorConfig::default(),
            clock: None,
            subscribers: Vec::new(),
        }
    }

    pub fn with_config(mut self, cfg: SupervisorConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Clock driving the reconciliation loop and the restore wait (default: [`TokioClock`]).
    pub fn with_clock(mut self, clock: ClockRef) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Event subscribers; each gets its own queue and worker while `run` is active.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    pub fn build(self) -> Supervisor<K, R> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(TokioClock::new()) as ClockRef);

        Supervisor::from_shared(Arc::new(Shared {
            cfg: self.cfg,
            table: self.table,
            clock,
            entries: DashMap::new(),
            gate: Arc::new(RwLock::new(None)),
            bus,
            subscribers: self.subscribers,
        }))
    }
}
