//! # Cancellation policies for task batches.
//!
//! [`CancelPolicy`] decides, after each task of a batch completes, whether the batch's
//! shared scope is cancelled for the remaining (sequential) or still running (parallel)
//! tasks.
//!
//! ```text
//! OnError   → cancel on the first error          (run until first failure)
//! OnReturn  → cancel as soon as any task returns (interrupt siblings)
//! Never     → run everything to completion       (teardown)
//! ```

use crate::error::Error;

/// Policy controlling cancellation of a batch's shared scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CancelPolicy {
    /// Cancel only when a task returns an error (default).
    #[default]
    OnError,
    /// Cancel as soon as any task returns, error or not.
    OnReturn,
    /// Never cancel; every task runs to completion.
    Never,
}

impl CancelPolicy {
    /// Returns `true` if the batch's scope should be cancelled after `res`.
    pub fn should_cancel(&self, res: &Result<(), Error>) -> bool {
        match self {
            CancelPolicy::OnError => res.is_err(),
            CancelPolicy::OnReturn => true,
            CancelPolicy::Never => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisions_follow_policy() {
        let ok = Ok(());
        let err = Err(Error::fail("x"));

        assert!(!CancelPolicy::OnError.should_cancel(&ok));
        assert!(CancelPolicy::OnError.should_cancel(&err));
        assert!(CancelPolicy::OnReturn.should_cancel(&ok));
        assert!(CancelPolicy::OnReturn.should_cancel(&err));
        assert!(!CancelPolicy::Never.should_cancel(&ok));
        assert!(!CancelPolicy::Never.should_cancel(&err));
    }
}
