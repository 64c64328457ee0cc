//! Error types used by processes, composition groups and the supervisor.
//!
//! The crate has a single error enum, [`Error`], covering the whole taxonomy:
//!
//! - **invalid-state**: an operation was attempted from a state that forbids it;
//! - **already-exists** / **not-found** / **not-running**: supervisor key bookkeeping;
//! - **startup** / **execution**: wrapped terminal error of a runnable;
//! - **aggregate**: several errors combined by a group or a task batch ([`Errors`]).
//!
//! [`Error`] is `Clone`: a process captures its terminal error once and hands it out
//! to every observer (`start`, `stop`, `err`) without consuming it.

use std::fmt;

use thiserror::Error;

use crate::process::State;

/// # Errors produced by processes, groups and the supervisor.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// A runnable failed on its own.
    #[error("runnable failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// A runnable panicked; the panic was caught and converted.
    #[error("runnable panicked: {info}")]
    Panicked {
        /// Panic payload, if it was a string.
        info: String,
    },

    /// The caller's bound was cancelled before the operation completed.
    #[error("context cancelled")]
    Canceled,

    /// The operation is not allowed from the current process state.
    #[error("invalid state: cannot {op} from {state}")]
    InvalidState {
        /// Attempted operation (`start`, `stop`, `run`).
        op: &'static str,
        /// State observed at call time.
        state: State,
    },

    /// The key is already reserved by a live (or starting) entry.
    #[error("already exists: {key}")]
    AlreadyExists {
        /// Debug rendering of the key.
        key: String,
    },

    /// The key has no live entry.
    #[error("not found: {key}")]
    NotFound {
        /// Debug rendering of the key.
        key: String,
    },

    /// The supervisor is not running, or the entry has not reached `Running` yet.
    #[error("not running: {key}")]
    NotRunning {
        /// Debug rendering of the key (`supervisor` when the supervisor itself is down).
        key: String,
    },

    /// The runnable terminated before it signalled readiness.
    #[error("startup failed: {source}")]
    Startup {
        /// Terminal error of the runnable.
        source: Box<Error>,
    },

    /// The runnable terminated with an error after it was running.
    #[error("process failed: {source}")]
    Execution {
        /// Terminal error of the runnable.
        source: Box<Error>,
    },

    /// The runnable returned `Ok` without ever invoking its callback.
    #[error("runnable exited before it became ready")]
    ExitedBeforeReady,

    /// The backing table failed.
    #[error("table error: {error}")]
    Table {
        /// The underlying error message.
        error: String,
    },

    /// Several errors combined by a group or a task batch.
    #[error("{0}")]
    Aggregate(Errors),
}

impl Error {
    /// Builds a [`Error::Fail`] from anything printable.
    pub fn fail(error: impl fmt::Display) -> Self {
        Error::Fail {
            error: error.to_string(),
        }
    }

    /// Builds a [`Error::Table`] from anything printable.
    pub fn table(error: impl fmt::Display) -> Self {
        Error::Table {
            error: error.to_string(),
        }
    }

    pub(crate) fn already_exists(key: &impl fmt::Debug) -> Self {
        Error::AlreadyExists {
            key: format!("{key:?}"),
        }
    }

    pub(crate) fn not_found(key: &impl fmt::Debug) -> Self {
        Error::NotFound {
            key: format!("{key:?}"),
        }
    }

    pub(crate) fn not_running(key: &impl fmt::Debug) -> Self {
        Error::NotRunning {
            key: format!("{key:?}"),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/events.
    ///
    /// # Example
    /// ```
    /// use procvisor::Error;
    ///
    /// let err = Error::fail("boom");
    /// assert_eq!(err.as_label(), "runnable_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::Fail { .. } => "runnable_failed",
            Error::Panicked { .. } => "runnable_panicked",
            Error::Canceled => "canceled",
            Error::InvalidState { .. } => "invalid_state",
            Error::AlreadyExists { .. } => "already_exists",
            Error::NotFound { .. } => "not_found",
            Error::NotRunning { .. } => "not_running",
            Error::Startup { .. } => "startup_failure",
            Error::Execution { .. } => "execution_failure",
            Error::ExitedBeforeReady => "exited_before_ready",
            Error::Table { .. } => "table_error",
            Error::Aggregate(_) => "aggregate",
        }
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Error::InvalidState { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_not_running(&self) -> bool {
        matches!(self, Error::NotRunning { .. })
    }

    /// Strips `Startup`/`Execution` wrappers and returns the runnable's own error.
    pub fn root(&self) -> &Error {
        match self {
            Error::Startup { source } | Error::Execution { source } => source.root(),
            other => other,
        }
    }
}

/// Ordered collection of errors, combined without flattening.
///
/// Produced by task batches and group teardown. Each original error is kept
/// as-is and remains reachable through [`Errors::iter`].
#[derive(Debug, Clone, Default)]
pub struct Errors(Vec<Error>);

impl Errors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, err: Error) {
        self.0.push(err);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }

    /// Collapses the collection: no error → `Ok`, one error → that error,
    /// several → [`Error::Aggregate`].
    pub fn into_result(mut self) -> Result<(), Error> {
        match self.0.len() {
            0 => Ok(()),
            1 => Err(self.0.remove(0)),
            _ => Err(Error::Aggregate(self)),
        }
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors: [", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        f.write_str("]")
    }
}

impl FromIterator<Error> for Errors {
    fn from_iter<I: IntoIterator<Item = Error>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Errors {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Converts a caught panic payload into a readable message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
