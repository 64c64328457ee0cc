use std::fmt;

/// Lifecycle state of a [`Process`](crate::Process).
///
/// ```text
/// Initial ──start──► Starting ──ready──► Running ──stop / exit──► Stopped
///    │                  │                                           ▲
///    └──────stop────────┴────────────stop / exit────────────────────┘
/// ```
///
/// `Stopped` is terminal; a stopped process is never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    Initial,
    Starting,
    Running,
    Stopped,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Initial => "initial",
            State::Starting => "starting",
            State::Running => "running",
            State::Stopped => "stopped",
        }
    }

    /// `true` for [`State::Stopped`].
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Stopped)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
