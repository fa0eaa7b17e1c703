//! Process identity
//!
//! Tells the process that started the session apart from forked workers and
//! multiprocessing children, whose scheduler hooks never reach the session's
//! controller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// OS process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pid(u32);

impl Pid {
    /// Wrap a raw process id
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Id of the calling process
    #[must_use]
    pub fn current() -> Self {
        Self(std::process::id())
    }

    /// Raw process id
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process id captured when the session started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessIdentity {
    session_pid: Pid,
}

impl ProcessIdentity {
    /// Capture the current process as the session process
    #[must_use]
    pub fn capture() -> Self {
        Self {
            session_pid: Pid::current(),
        }
    }

    /// Identity for a known session process
    #[must_use]
    pub const fn from_pid(session_pid: Pid) -> Self {
        Self { session_pid }
    }

    /// Process that started the session
    #[must_use]
    pub const fn session_pid(&self) -> Pid {
        self.session_pid
    }

    /// Whether `observed` is a different process than the session's
    #[must_use]
    pub fn is_secondary(&self, observed: Pid) -> bool {
        observed != self.session_pid
    }

    /// Whether the calling process is a different process than the session's
    #[must_use]
    pub fn is_secondary_process(&self) -> bool {
        self.is_secondary(Pid::current())
    }
}
