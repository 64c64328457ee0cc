use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, Sleep};

use crate::clock::{Clock, Timer};

/// Wall clock backed by `tokio::time`.
#[derive(Clone, Copy, Debug)]
pub struct TokioClock {
    epoch: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        Instant::now().saturating_duration_since(self.epoch)
    }

    fn after(&self, d: Duration) -> Box<dyn Timer> {
        Box::new(TokioTimer {
            sleep: Box::pin(tokio::time::sleep(d)),
            armed: true,
        })
    }
}

struct TokioTimer {
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

#[async_trait]
impl Timer for TokioTimer {
    async fn fired(&mut self) {
        if !self.armed {
            return std::future::pending().await;
        }
        self.sleep.as_mut().await;
        self.armed = false;
    }

    fn stop(&mut self) -> bool {
        let pending = self.armed && !self.sleep.is_elapsed();
        self.armed = false;
        pending
    }

    fn reset(&mut self, d: Duration) {
        self.sleep.as_mut().reset(Instant::now() + d);
        self.armed = true;
    }
}
