//! # Time source and timers.
//!
//! The supervisor and [`Retry`](crate::Retry) never touch tokio's timer directly; they
//! go through a [`Clock`], so tests can drive time by hand.
//!
//! - [`TokioClock`] real time backed by `tokio::time` (honours `tokio::time::pause`);
//! - [`FakeClock`] virtual time, advanced explicitly with [`FakeClock::tick`].

mod fake;
mod tokio_clock;

pub use fake::FakeClock;
pub use tokio_clock::TokioClock;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Shared handle to a clock.
pub type ClockRef = Arc<dyn Clock>;

/// Source of the current time and of one-shot timers.
pub trait Clock: Send + Sync + 'static {
    /// Time elapsed since the clock's epoch.
    fn now(&self) -> Duration;

    /// Arms a timer that fires once `d` has elapsed.
    fn after(&self, d: Duration) -> Box<dyn Timer>;
}

/// One-shot, re-armable timer.
#[async_trait]
pub trait Timer: Send {
    /// Resolves when the timer fires. A stopped (or already fired) timer never
    /// resolves again until it is [`reset`](Timer::reset).
    async fn fired(&mut self);

    /// Disarms the timer; returns `true` if it had not fired yet.
    fn stop(&mut self) -> bool;

    /// Re-arms the timer to fire `d` from now.
    fn reset(&mut self, d: Duration);
}
