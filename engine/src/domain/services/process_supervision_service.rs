//! Process Supervisor
//! Spawns programs, watches each one from its own task, and applies the
//! exit-handling and auto-restart rules.
//!
//! Locking: every mutation of a program happens under that program's slot
//! lock. Notifications are published only after the slot lock is released,
//! since building a snapshot takes every slot lock in turn.

use crate::domain::ports::{ChangeNotifier, ProcessExecutor, ProcessExitHandle, SpawnConfig};
use crate::domain::services::program_registry::{ProgramEntry, ProgramRegistry, ProgramSnapshot};
use crate::domain::{DomainError, ExitOutcome, ProcessInstance, ProcessState, StartKind};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct ProcessSupervisor {
    registry: Arc<ProgramRegistry>,
    executor: Arc<dyn ProcessExecutor>,
    notifier: Arc<dyn ChangeNotifier>,
}

impl ProcessSupervisor {
    pub fn new(
        registry: Arc<ProgramRegistry>,
        executor: Arc<dyn ProcessExecutor>,
        notifier: Arc<dyn ChangeNotifier>,
    ) -> Self {
        Self {
            registry,
            executor,
            notifier,
        }
    }

    pub fn registry(&self) -> &Arc<ProgramRegistry> {
        &self.registry
    }

    pub async fn snapshot(&self) -> Vec<ProgramSnapshot> {
        self.registry.snapshot().await
    }

    /// Start a program by name. Returns the new PID.
    pub async fn start(&self, name: &str) -> Result<u32, DomainError> {
        let entry = self.entry(name)?;
        let result = self.start_entry(&entry, StartKind::Fresh).await;
        if matches!(result, Ok(_) | Err(DomainError::SpawnFailed { .. })) {
            self.publish().await;
        }
        result
    }

    /// Stop a program by name. Stopping a program that is not running is a no-op.
    pub async fn stop(&self, name: &str) -> Result<(), DomainError> {
        let entry = self.entry(name)?;
        if self.stop_entry(&entry).await? {
            self.publish().await;
        }
        Ok(())
    }

    /// Stop, wait for the old process to be gone, then start again
    pub async fn restart(&self, name: &str) -> Result<u32, DomainError> {
        let entry = self.entry(name)?;
        self.restart_entry(&entry).await
    }

    /// Stop a program and drop it from the registry
    pub async fn retire(&self, name: &str) {
        let Some(entry) = self.registry.lookup(name) else {
            return;
        };
        match self.stop_entry(&entry).await {
            Ok(true) => self.await_monitor(&entry).await,
            Ok(false) => {}
            Err(e) => {
                warn!(
                    program = %name,
                    error = %e,
                    "Failed to stop removed program, it may still be running"
                );
                if let Some(instance) = entry.lock().await.instance.as_mut() {
                    instance.mark_retired();
                }
            }
        }
        self.registry.remove(name);
        info!(program = %name, "Program removed");
        self.publish().await;
    }

    /// Stop every live program through the user-stop path and wait for the exits
    pub async fn stop_all(&self) {
        let entries = self.registry.entries();
        let mut stopped = Vec::new();
        for entry in entries {
            match self.stop_entry(&entry).await {
                Ok(true) => stopped.push(entry),
                Ok(false) => {}
                Err(e) => error!(program = %entry.name(), error = %e, "Failed to stop program"),
            }
        }
        for entry in &stopped {
            self.await_monitor(entry).await;
        }
        if !stopped.is_empty() {
            info!(count = stopped.len(), "Stopped all programs");
            self.publish().await;
        }
    }

    fn entry(&self, name: &str) -> Result<Arc<ProgramEntry>, DomainError> {
        self.registry
            .lookup(name)
            .ok_or_else(|| DomainError::ProgramNotFound(name.to_string()))
    }

    async fn publish(&self) {
        let snapshot = self.registry.snapshot().await;
        self.notifier.notify(snapshot).await;
    }

    async fn start_entry(
        &self,
        entry: &Arc<ProgramEntry>,
        kind: StartKind,
    ) -> Result<u32, DomainError> {
        let mut guard = entry.lock().await;
        let slot = &mut *guard;
        let instance = slot.instance.get_or_insert_with(ProcessInstance::new);

        if kind == StartKind::Respawn && instance.state() != ProcessState::Backoff {
            // a stop or a fresh start got in first
            debug!(program = %entry.name(), state = %instance.state(), "Respawn superseded");
            return Err(DomainError::InvalidStateTransition {
                from: instance.state().to_string(),
                to: ProcessState::Starting.to_string(),
            });
        }
        if let (true, Some(pid)) = (instance.state().is_alive(), instance.pid()) {
            return Err(DomainError::AlreadyRunning {
                name: entry.name().to_string(),
                pid,
            });
        }

        let generation = instance.mark_starting(kind)?;
        let config = SpawnConfig::from_program(&slot.program);

        match self.executor.spawn(config).await {
            Ok(spawned) => {
                instance.mark_running(spawned.pid)?;
                info!(
                    program = %entry.name(),
                    pid = spawned.pid,
                    retry_count = instance.retry_count(),
                    "Program started"
                );
                slot.monitor = Some(self.spawn_monitor(
                    entry.clone(),
                    generation,
                    spawned.exit_handle,
                ));
                Ok(spawned.pid)
            }
            Err(e) => {
                instance.mark_spawn_failed()?;
                error!(program = %entry.name(), error = %e, "Failed to spawn program");
                Err(e)
            }
        }
    }

    /// Returns true when a kill was issued or a pending respawn was cancelled
    async fn stop_entry(&self, entry: &Arc<ProgramEntry>) -> Result<bool, DomainError> {
        let mut guard = entry.lock().await;
        let Some(instance) = guard.instance.as_mut() else {
            debug!(program = %entry.name(), "Stop requested for a program that never started");
            return Ok(false);
        };

        let pid = match (instance.state(), instance.pid()) {
            (ProcessState::Running, Some(pid)) => pid,
            (ProcessState::Backoff, _) => {
                instance.cancel_backoff()?;
                info!(program = %entry.name(), "Pending restart cancelled");
                return Ok(true);
            }
            (state, _) => {
                debug!(program = %entry.name(), state = %state, "Program not running, nothing to stop");
                return Ok(false);
            }
        };

        // flag must be visible to the monitor before the process dies
        let previous = instance.mark_stopping()?;
        match self.executor.kill(pid).await {
            Ok(()) => {
                info!(program = %entry.name(), pid = pid, "Stop signal sent");
                Ok(true)
            }
            Err(e) => {
                instance.revert_stopping(previous)?;
                error!(program = %entry.name(), pid = pid, error = %e, "Failed to kill program");
                Err(e)
            }
        }
    }

    async fn restart_entry(&self, entry: &Arc<ProgramEntry>) -> Result<u32, DomainError> {
        if self.stop_entry(entry).await? {
            self.publish().await;
            self.await_monitor(entry).await;
        }
        let result = self.start_entry(entry, StartKind::Fresh).await;
        if matches!(result, Ok(_) | Err(DomainError::SpawnFailed { .. })) {
            self.publish().await;
        }
        result
    }

    /// Wait until the current monitor has recorded the exit
    async fn await_monitor(&self, entry: &Arc<ProgramEntry>) {
        let handle = entry.lock().await.monitor.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(program = %entry.name(), error = %e, "Monitor task ended abnormally");
            }
        }
    }

    fn spawn_monitor(
        &self,
        entry: Arc<ProgramEntry>,
        generation: u64,
        exit_handle: ProcessExitHandle,
    ) -> JoinHandle<()> {
        let supervisor = self.clone();
        let task: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
            let outcome = exit_handle.await;
            supervisor.handle_exit(entry, generation, outcome).await;
        });
        tokio::spawn(task)
    }

    async fn handle_exit(
        &self,
        entry: Arc<ProgramEntry>,
        generation: u64,
        outcome: Result<ExitOutcome, DomainError>,
    ) {
        let outcome = outcome.unwrap_or_else(|e| {
            error!(program = %entry.name(), error = %e, "Lost track of program, treating as crashed");
            ExitOutcome::Code(1)
        });

        let exited = {
            let mut guard = entry.lock().await;
            let slot = &mut *guard;
            let Some(instance) = slot.instance.as_mut() else {
                return;
            };
            if instance.generation() != generation {
                debug!(program = %entry.name(), generation = generation, "Ignoring exit of superseded process");
                return;
            }
            slot.monitor = None;

            match instance.mark_exited(outcome) {
                Ok(state) => {
                    info!(
                        program = %entry.name(),
                        outcome = %outcome,
                        state = %state,
                        by_user = instance.stop_requested_by_user(),
                        "Program exited"
                    );
                    state
                }
                Err(e) => {
                    warn!(program = %entry.name(), error = %e, "Unexpected exit transition");
                    return;
                }
            }
        };

        // the exit itself is published before any restart decision
        self.publish().await;

        let Some(respawn) = self.decide_restart(&entry, generation, exited).await else {
            return;
        };
        self.publish().await;

        if respawn {
            match self.start_entry(&entry, StartKind::Respawn).await {
                Ok(_) | Err(DomainError::SpawnFailed { .. }) => self.publish().await,
                Err(DomainError::InvalidStateTransition { .. }) => {}
                Err(e) => warn!(program = %entry.name(), error = %e, "Auto-restart failed"),
            }
        }
    }

    /// Move an exited program to Backoff or Fatal.
    ///
    /// `None` when no restart applies: the stop was the user's, auto-restart is
    /// off, the program was dropped from the registry, or something else
    /// touched the slot since the exit was recorded. Otherwise `Some(true)`
    /// for a pending respawn and `Some(false)` for an exhausted budget.
    async fn decide_restart(
        &self,
        entry: &Arc<ProgramEntry>,
        generation: u64,
        exited: ProcessState,
    ) -> Option<bool> {
        let registered = self
            .registry
            .lookup(entry.name())
            .is_some_and(|current| Arc::ptr_eq(&current, entry));
        if !registered {
            debug!(program = %entry.name(), "Program no longer registered, not restarting");
            return None;
        }

        let mut guard = entry.lock().await;
        let slot = &mut *guard;
        let instance = slot.instance.as_mut()?;
        if instance.generation() != generation || instance.state() != exited {
            return None;
        }
        let program = &slot.program;
        if instance.stop_requested_by_user() || !program.is_auto_restart() {
            return None;
        }

        let threshold = program.runtime_success_sec();
        let sustained = threshold > 0
            && instance
                .last_run_duration()
                .is_some_and(|d| d >= Duration::from_secs(threshold));
        if sustained && instance.retry_count() > 0 {
            debug!(program = %entry.name(), "Sustained run, resetting retry count");
            instance.reset_retry_count();
        }

        if instance.retry_count() < program.max_restart_count() {
            instance.mark_backoff().ok().map(|_| true)
        } else {
            warn!(
                program = %entry.name(),
                retry_count = instance.retry_count(),
                max_restart_count = program.max_restart_count(),
                "Restart budget exhausted"
            );
            match instance.mark_fatal() {
                Ok(()) => Some(false),
                Err(e) => {
                    warn!(program = %entry.name(), error = %e, "Unexpected fatal transition");
                    None
                }
            }
        }
    }
}
