//! ProcessState Value Object
//!
//! Lifecycle states of a program instance. The integer codes are part of the
//! wire format: snapshots pushed to the controller carry `code()`, not the name.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProcessState {
    /// Deliberately halted, or never started
    #[default]
    Stopped,
    /// Spawn in progress
    Starting,
    Running,
    /// Between an unexpected exit and the next auto-restart attempt
    Backoff,
    /// Kill issued, waiting for the monitor to observe the exit
    Stopping,
    /// Terminated abnormally (non-zero code or signal)
    Exited,
    /// Spawn failed or the restart budget is exhausted
    Fatal,
    /// No instance has ever been observed
    Unknown,
}

impl ProcessState {
    pub fn code(&self) -> i32 {
        match self {
            Self::Stopped => 0,
            Self::Starting => 10,
            Self::Running => 20,
            Self::Backoff => 30,
            Self::Stopping => 40,
            Self::Exited => 50,
            Self::Fatal => 60,
            Self::Unknown => 70,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Stopped),
            10 => Some(Self::Starting),
            20 => Some(Self::Running),
            30 => Some(Self::Backoff),
            40 => Some(Self::Stopping),
            50 => Some(Self::Exited),
            60 => Some(Self::Fatal),
            70 => Some(Self::Unknown),
            _ => None,
        }
    }

    /// States that own a live OS process
    pub fn is_alive(&self) -> bool {
        matches!(self, Self::Running | Self::Stopping)
    }

    pub fn can_transition_to(&self, target: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, target),
            (Stopped | Exited | Backoff | Fatal | Unknown, Starting)
                | (Starting, Running | Fatal)
                | (Running, Stopping | Stopped | Exited)
                // a failed kill puts the instance back to Running
                | (Stopping, Stopped | Exited | Running)
                | (Stopped | Exited, Backoff | Fatal)
                // a stop request cancels a pending respawn
                | (Backoff, Stopped)
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Backoff => "backoff",
            Self::Stopping => "stopping",
            Self::Exited => "exited",
            Self::Fatal => "fatal",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}
