//! Domain-level errors
//! These represent business rule violations and failed lifecycle operations

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    // Lookup errors
    #[error("Program '{0}' not found")]
    ProgramNotFound(String),

    // Validation errors
    #[error("Invalid program '{name}': {reason}")]
    InvalidProgram { name: String, reason: String },

    #[error("Invalid command body: {0}")]
    InvalidBody(String),

    // Lifecycle errors
    #[error("Program '{name}' is already running (PID: {pid})")]
    AlreadyRunning { name: String, pid: u32 },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Process execution errors
    #[error("Failed to spawn '{command}': {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("Failed to kill process {pid}: {reason}")]
    KillFailed { pid: u32, reason: String },

    #[error("Failed to wait for process {pid}: {reason}")]
    WaitFailed { pid: u32, reason: String },
}

pub type Result<T> = std::result::Result<T, DomainError>;
