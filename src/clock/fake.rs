//! # Virtual clock for deterministic tests.
//!
//! Time only moves through [`FakeClock::advance`]; timers only fire through
//! [`FakeClock::fire_due`] (or [`FakeClock::tick`], which does both). A timer armed
//! with a zero delay fires immediately.
//!
//! Background loops arm their timers asynchronously; [`FakeClock::wait_for_pending`]
//! lets a test wait until they did before moving time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, Timer};

/// Manually driven clock.
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    armed: watch::Sender<usize>,
}

#[derive(Default)]
struct State {
    now: Duration,
    next_id: u64,
    timers: HashMap<u64, (Duration, CancellationToken)>,
}

impl FakeClock {
    pub fn new() -> Self {
        let (armed, _) = watch::channel(0);
        Self {
            inner: Arc::new(Shared {
                state: Mutex::new(State::default()),
                armed,
            }),
        }
    }

    /// Moves virtual time forward without firing anything.
    pub fn advance(&self, d: Duration) {
        self.inner.lock().now += d;
    }

    /// Fires every armed timer whose deadline has passed; returns how many fired.
    pub fn fire_due(&self) -> usize {
        let mut state = self.inner.lock();
        let now = state.now;
        let due: Vec<u64> = state
            .timers
            .iter()
            .filter(|(_, (deadline, _))| *deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &due {
            if let Some((_, fired)) = state.timers.remove(id) {
                fired.cancel();
            }
        }
        self.inner.publish(&state);
        due.len()
    }

    /// Advances by `d`, then fires due timers.
    pub fn tick(&self, d: Duration) -> usize {
        self.advance(d);
        self.fire_due()
    }

    /// Number of armed timers.
    pub fn pending(&self) -> usize {
        self.inner.lock().timers.len()
    }

    /// Waits until at least `n` timers are armed.
    pub async fn wait_for_pending(&self, n: usize) {
        let mut rx = self.inner.armed.subscribe();
        let _ = rx.wait_for(|armed| *armed >= n).await;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &State) {
        self.armed.send_replace(state.timers.len());
    }

    /// Arms timer `id`; returns its fire latch.
    fn arm(&self, id: u64, d: Duration) -> CancellationToken {
        let fired = CancellationToken::new();
        let mut state = self.lock();
        state.timers.remove(&id);
        if d.is_zero() {
            fired.cancel();
        } else {
            let deadline = state.now + d;
            state.timers.insert(id, (deadline, fired.clone()));
        }
        self.publish(&state);
        fired
    }

    fn disarm(&self, id: u64) -> bool {
        let mut state = self.lock();
        let was_armed = state.timers.remove(&id).is_some();
        self.publish(&state);
        was_armed
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        self.inner.lock().now
    }

    fn after(&self, d: Duration) -> Box<dyn Timer> {
        let id = {
            let mut state = self.inner.lock();
            state.next_id += 1;
            state.next_id
        };
        let fired = self.inner.arm(id, d);
        Box::new(FakeTimer {
            clock: Arc::clone(&self.inner),
            id,
            fired,
        })
    }
}

struct FakeTimer {
    clock: Arc<Shared>,
    id: u64,
    fired: CancellationToken,
}

#[async_trait]
impl Timer for FakeTimer {
    async fn fired(&mut self) {
        self.fired.cancelled().await;
        // one-shot: later calls wait for a reset
        self.fired = CancellationToken::new();
    }

    fn stop(&mut self) -> bool {
        self.fired = CancellationToken::new();
        self.clock.disarm(self.id)
    }

    fn reset(&mut self, d: Duration) {
        self.fired = self.clock.arm(self.id, d);
    }
}

impl Drop for FakeTimer {
    fn drop(&mut self) {
        self.clock.disarm(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timers_fire_only_when_due() {
        let clock = FakeClock::new();
        let mut short = clock.after(Duration::from_secs(1));
        let mut long = clock.after(Duration::from_secs(10));
        assert_eq!(clock.pending(), 2);

        assert_eq!(clock.tick(Duration::from_secs(2)), 1);
        short.fired().await;
        assert_eq!(clock.pending(), 1);
        assert_eq!(clock.now(), Duration::from_secs(2));

        assert_eq!(clock.tick(Duration::from_secs(8)), 1);
        long.fired().await;
        assert_eq!(clock.pending(), 0);
    }

    #[tokio::test]
    async fn advance_alone_fires_nothing() {
        let clock = FakeClock::new();
        let _timer = clock.after(Duration::from_secs(1));
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.pending(), 1);
        assert_eq!(clock.fire_due(), 1);
    }

    #[tokio::test]
    async fn stop_reset_and_drop_disarm() {
        let clock = FakeClock::new();
        let mut timer = clock.after(Duration::from_secs(1));
        assert!(timer.stop());
        assert!(!timer.stop());
        assert_eq!(clock.tick(Duration::from_secs(5)), 0);

        timer.reset(Duration::from_secs(1));
        assert_eq!(clock.pending(), 1);
        drop(timer);
        assert_eq!(clock.pending(), 0);
    }

    #[tokio::test]
    async fn zero_delay_fires_immediately() {
        let clock = FakeClock::new();
        let mut timer = clock.after(Duration::ZERO);
        assert_eq!(clock.pending(), 0);
        timer.fired().await;
    }

    #[tokio::test]
    async fn wait_for_pending_sees_timers_armed_elsewhere() {
        let clock = FakeClock::new();
        let remote = clock.clone();
        let armer = tokio::spawn(async move {
            let mut timer = remote.after(Duration::from_secs(3));
            timer.fired().await;
        });

        clock.wait_for_pending(1).await;
        clock.tick(Duration::from_secs(3));
        armer.await.unwrap();
    }
}
