//! # Supervisor configuration.
//!
//! | Field              | Default | Meaning                                        |
//! |--------------------|---------|------------------------------------------------|
//! | `restart_interval` | 5s      | reconciliation tick (min 1ms)                  |
//! | `restore_wait`     | 1s      | bound on the initial restoration wait          |
//! | `bus_capacity`     | 1024    | event bus ring size (min 1)                    |
//!
//! Fields are public; read them through the clamping accessors so out-of-range values
//! never reach the timers or the bus.

use std::time::Duration;

const MIN_RESTART_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration of a [`Supervisor`](crate::Supervisor).
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Interval between reconciliation passes over the table.
    pub restart_interval: Duration,

    /// How long `run` waits for the initial restoration pass before invoking its
    /// callback. Units still starting after that keep starting in the background.
    pub restore_wait: Duration,

    /// Capacity of the event bus ring buffer.
    pub bus_capacity: usize,
}

impl SupervisorConfig {
    #[inline]
    pub fn restart_interval_clamped(&self) -> Duration {
        self.restart_interval.max(MIN_RESTART_INTERVAL)
    }

    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_interval: Duration::from_secs(5),
            restore_wait: Duration::from_secs(1),
            bus_capacity: 1024,
        }
    }
}
