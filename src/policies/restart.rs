//! # Restart decision after an attempt ends.
//!
//! ```text
//! | Policy                | Ok(())                 | Err(_)           |
//! |-----------------------|------------------------|------------------|
//! | Never                 | stop                   | stop             |
//! | OnFailure (default)   | stop                   | restart, backoff |
//! | Always { interval }   | restart after interval | restart, backoff |
//! ```

use std::time::Duration;

use crate::error::Error;
use crate::policies::BackoffPolicy;

/// Policy controlling whether an ended attempt is run again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Run once; the attempt's result is the final result.
    Never,
    /// Run again only after errors.
    #[default]
    OnFailure,
    /// Run again after every attempt; successful attempts wait `interval` first.
    Always { interval: Duration },
}

impl RestartPolicy {
    /// Returns the delay before the next attempt, or `None` to give up.
    ///
    /// `failures` counts consecutive failed attempts, including this one when `res`
    /// is an error; it selects the backoff step.
    pub fn after(
        &self,
        res: &Result<(), Error>,
        failures: u32,
        backoff: &BackoffPolicy,
    ) -> Option<Duration> {
        match (self, res) {
            (RestartPolicy::Never, _) => None,
            (RestartPolicy::OnFailure, Ok(())) => None,
            (RestartPolicy::Always { interval }, Ok(())) => Some(*interval),
            (_, Err(_)) => Some(backoff.next(failures.saturating_sub(1))),
        }
    }
}
