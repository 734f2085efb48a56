//! ProcessExecutor port
//! Interface for spawning and killing OS processes

use crate::domain::{DomainError, ExitOutcome, Program};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

/// Everything needed to launch one program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: String,
    /// Append stdout and stderr here; discarded when None
    pub output: Option<String>,
}

impl SpawnConfig {
    pub fn from_program(program: &Program) -> Self {
        Self {
            name: program.name().to_string(),
            command: program.command().to_string(),
            args: program.args().to_vec(),
            working_dir: program.directory().to_string(),
            output: program.output().map(|s| s.to_string()),
        }
    }
}

/// Resolves once the spawned process terminates
pub type ProcessExitHandle = Pin<Box<dyn Future<Output = Result<ExitOutcome, DomainError>> + Send>>;

pub struct SpawnResult {
    pub pid: u32,
    pub exit_handle: ProcessExitHandle,
}

impl std::fmt::Debug for SpawnResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnResult")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    /// Spawn a process; returns once the OS handle exists
    async fn spawn(&self, config: SpawnConfig) -> Result<SpawnResult, DomainError>;

    /// Forcibly terminate a running process
    async fn kill(&self, pid: u32) -> Result<(), DomainError>;
}
