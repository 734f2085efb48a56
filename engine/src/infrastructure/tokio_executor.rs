//! Tokio Process Executor
//! Real implementation of the ProcessExecutor port
//!
//! Children are spawned with `std::process::Command`; the blocking `wait()` runs
//! on the blocking pool and its result is handed back through a oneshot channel.

use crate::domain::ports::{ProcessExecutor, ProcessExitHandle, SpawnConfig, SpawnResult};
use crate::domain::{DomainError, ExitOutcome};
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error, info, warn};

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessExecutor;

impl TokioProcessExecutor {
    pub fn new() -> Self {
        Self
    }

    /// A relative command that exists inside the working directory runs from
    /// there; anything else is left to the OS (absolute path or PATH lookup).
    pub fn resolve_command(working_dir: &str, command: &str) -> PathBuf {
        let path = Path::new(command);
        if path.is_relative() && !working_dir.is_empty() {
            let candidate = Path::new(working_dir).join(path);
            if candidate.is_file() {
                return candidate;
            }
        }
        path.to_path_buf()
    }

    /// Both streams go to the same file, opened for append
    fn configure_output(output: Option<&str>) -> Result<(Stdio, Stdio), DomainError> {
        match output {
            None => Ok((Stdio::null(), Stdio::null())),
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| DomainError::SpawnFailed {
                        command: path.to_string(),
                        reason: format!("cannot open output file: {}", e),
                    })?;
                let stderr = file.try_clone().map_err(|e| DomainError::SpawnFailed {
                    command: path.to_string(),
                    reason: format!("cannot duplicate output handle: {}", e),
                })?;
                Ok((Stdio::from(file), Stdio::from(stderr)))
            }
        }
    }

    fn create_exit_handle(mut child: std::process::Child, pid: u32) -> ProcessExitHandle {
        let (tx, rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let exit_result = tokio::task::spawn_blocking(move || match child.wait() {
                Ok(status) => {
                    let outcome = ExitOutcome::from_status(status);
                    debug!(pid = pid, outcome = %outcome, "Process exited");
                    Ok(outcome)
                }
                Err(e) => {
                    error!(pid = pid, error = %e, "Failed to wait for process");
                    Err(DomainError::WaitFailed {
                        pid,
                        reason: e.to_string(),
                    })
                }
            })
            .await
            .unwrap_or_else(|e| {
                error!(error = %e, "Blocking wait task panicked");
                Err(DomainError::WaitFailed {
                    pid,
                    reason: format!("wait task panicked: {}", e),
                })
            });
            let _ = tx.send(exit_result);
        });

        Box::pin(async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(DomainError::WaitFailed {
                    pid,
                    reason: "process monitor task died unexpectedly".to_string(),
                }),
            }
        })
    }
}

#[async_trait]
impl ProcessExecutor for TokioProcessExecutor {
    async fn spawn(&self, config: SpawnConfig) -> Result<SpawnResult, DomainError> {
        let program = Self::resolve_command(&config.working_dir, &config.command);
        info!(
            program = %config.name,
            command = %program.display(),
            args = ?config.args,
            working_dir = %config.working_dir,
            "Spawning process"
        );

        let (stdout, stderr) = Self::configure_output(config.output.as_deref())?;

        let mut cmd = Command::new(&program);
        cmd.args(&config.args)
            .current_dir(&config.working_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);

        let child = cmd.spawn().map_err(|e| {
            error!(
                program = %config.name,
                command = %program.display(),
                error = %e,
                "Failed to spawn process"
            );
            DomainError::SpawnFailed {
                command: program.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        let pid = child.id();
        debug!(program = %config.name, pid = pid, "Process spawned");

        Ok(SpawnResult {
            pid,
            exit_handle: Self::create_exit_handle(child, pid),
        })
    }

    async fn kill(&self, pid: u32) -> Result<(), DomainError> {
        info!(pid = pid, "Killing process");

        #[cfg(unix)]
        {
            let signal = crate::constants::process::KILL_SIGNAL;
            let result = unsafe { libc::kill(pid as i32, signal) };
            if result != 0 {
                let err = std::io::Error::last_os_error();
                warn!(pid = pid, signal = signal, error = %err, "Failed to send signal to process");
                return Err(DomainError::KillFailed {
                    pid,
                    reason: err.to_string(),
                });
            }
            debug!(pid = pid, signal = signal, "Signal sent");
            Ok(())
        }

        #[cfg(not(unix))]
        {
            Err(DomainError::KillFailed {
                pid,
                reason: "process termination not implemented on this platform".to_string(),
            })
        }
    }
}
