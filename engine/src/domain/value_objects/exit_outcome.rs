//! How an OS process terminated

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Normal termination with an exit code
    Code(i32),
    /// Killed by a signal
    Signal(i32),
}

impl ExitOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Code(0))
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Code(code) => Some(*code),
            Self::Signal(_) => None,
        }
    }

    #[cfg(unix)]
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;
        match (status.code(), status.signal()) {
            (Some(code), _) => Self::Code(code),
            (None, Some(signal)) => Self::Signal(signal),
            (None, None) => Self::Code(1),
        }
    }

    #[cfg(not(unix))]
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        Self::Code(status.code().unwrap_or(1))
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit code {}", code),
            Self::Signal(signal) => write!(f, "signal {}", signal),
        }
    }
}

/// Why a start is happening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKind {
    /// Reconciliation, an operator command or a restart: the retry budget starts over
    Fresh,
    /// Automatic respawn after an unexpected exit
    Respawn,
}
