//! ProcessInstance entity
//! Runtime record of one program's OS process, reused across stop/start cycles

use crate::domain::{DomainError, ExitOutcome, ProcessState, StartKind};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInstance {
    state: ProcessState,
    pid: Option<u32>,
    start_time: Option<SystemTime>,
    stop_time: Option<SystemTime>,
    exit_code: Option<i32>,

    in_start: bool,
    stop_requested_by_user: bool,
    retry_count: u32,

    // Bumped on every spawn attempt; a monitor only applies an exit for its own generation
    generation: u64,
}

impl Default for ProcessInstance {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessInstance {
    pub fn new() -> Self {
        Self {
            state: ProcessState::Stopped,
            pid: None,
            start_time: None,
            stop_time: None,
            exit_code: None,
            in_start: false,
            stop_requested_by_user: false,
            retry_count: 0,
            generation: 0,
        }
    }

    // ===== Getters =====

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn start_time(&self) -> Option<SystemTime> {
        self.start_time
    }

    pub fn stop_time(&self) -> Option<SystemTime> {
        self.stop_time
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn in_start(&self) -> bool {
        self.in_start
    }

    pub fn stop_requested_by_user(&self) -> bool {
        self.stop_requested_by_user
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// How long the last run lasted, once it has ended
    pub fn last_run_duration(&self) -> Option<Duration> {
        match (self.start_time, self.stop_time) {
            (Some(start), Some(stop)) => stop.duration_since(start).ok(),
            _ => None,
        }
    }

    // ===== Business Logic: State Transitions =====

    fn transition(&mut self, target: ProcessState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(target) {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        self.state = target;
        Ok(())
    }

    /// Enter Starting. Returns the generation the new spawn belongs to.
    pub fn mark_starting(&mut self, kind: StartKind) -> Result<u64, DomainError> {
        self.transition(ProcessState::Starting)?;
        match kind {
            StartKind::Fresh => {
                self.retry_count = 0;
                self.stop_requested_by_user = false;
            }
            StartKind::Respawn => self.retry_count += 1,
        }
        self.in_start = true;
        self.generation += 1;
        Ok(self.generation)
    }

    pub fn mark_running(&mut self, pid: u32) -> Result<(), DomainError> {
        self.transition(ProcessState::Running)?;
        self.pid = Some(pid);
        self.start_time = Some(SystemTime::now());
        self.stop_time = None;
        self.exit_code = None;
        Ok(())
    }

    /// Spawn failed: no further automatic attempts for this failure
    pub fn mark_spawn_failed(&mut self) -> Result<(), DomainError> {
        self.transition(ProcessState::Fatal)?;
        self.in_start = false;
        self.pid = None;
        Ok(())
    }

    /// Record the user's intent before the kill is issued.
    /// Returns the previous flag so a failed kill can be rolled back.
    pub fn mark_stopping(&mut self) -> Result<bool, DomainError> {
        self.transition(ProcessState::Stopping)?;
        let previous = self.stop_requested_by_user;
        self.stop_requested_by_user = true;
        Ok(previous)
    }

    /// Undo `mark_stopping` after the kill failed
    pub fn revert_stopping(&mut self, previous_flag: bool) -> Result<(), DomainError> {
        self.transition(ProcessState::Running)?;
        self.stop_requested_by_user = previous_flag;
        Ok(())
    }

    /// The OS process terminated. Returns the resulting state.
    /// A user-requested stop also clears the restart counter.
    pub fn mark_exited(&mut self, outcome: ExitOutcome) -> Result<ProcessState, DomainError> {
        let target = if self.stop_requested_by_user || outcome.is_clean() {
            ProcessState::Stopped
        } else {
            ProcessState::Exited
        };
        self.transition(target)?;
        if self.stop_requested_by_user {
            self.retry_count = 0;
        }
        self.pid = None;
        self.in_start = false;
        self.stop_time = Some(SystemTime::now());
        self.exit_code = outcome.code();
        Ok(target)
    }

    pub fn mark_backoff(&mut self) -> Result<(), DomainError> {
        self.transition(ProcessState::Backoff)
    }

    /// A stop arrived between an exit and its pending respawn
    pub fn cancel_backoff(&mut self) -> Result<(), DomainError> {
        self.transition(ProcessState::Stopped)?;
        self.stop_requested_by_user = true;
        self.retry_count = 0;
        Ok(())
    }

    /// Restart budget exhausted
    pub fn mark_fatal(&mut self) -> Result<(), DomainError> {
        self.transition(ProcessState::Fatal)
    }

    /// The program left the desired state while its process could not be
    /// killed. Whatever exit comes later must not trigger a respawn.
    pub fn mark_retired(&mut self) {
        self.stop_requested_by_user = true;
    }

    /// A sustained run clears the consecutive restart counter
    pub fn reset_retry_count(&mut self) {
        self.retry_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> ProcessInstance {
        let mut instance = ProcessInstance::new();
        instance.mark_starting(StartKind::Fresh).unwrap();
        instance.mark_running(42).unwrap();
        instance
    }

    #[test]
    fn test_new_instance_is_stopped() {
        let instance = ProcessInstance::new();
        assert_eq!(instance.state(), ProcessState::Stopped);
        assert_eq!(instance.pid(), None);
        assert_eq!(instance.generation(), 0);
    }

    #[test]
    fn test_start_sequence() {
        let instance = running();
        assert_eq!(instance.state(), ProcessState::Running);
        assert_eq!(instance.pid(), Some(42));
        assert!(instance.in_start());
        assert!(instance.start_time().is_some());
        assert!(instance.stop_time().is_none());
        assert_eq!(instance.generation(), 1);
    }

    #[test]
    fn test_cannot_start_twice() {
        let mut instance = running();
        let err = instance.mark_starting(StartKind::Fresh).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_abnormal_exit() {
        let mut instance = running();
        let state = instance.mark_exited(ExitOutcome::Code(1)).unwrap();
        assert_eq!(state, ProcessState::Exited);
        assert_eq!(instance.exit_code(), Some(1));
        assert_eq!(instance.pid(), None);
        assert!(!instance.in_start());
        assert!(instance.stop_time().is_some());
    }

    #[test]
    fn test_clean_exit() {
        let mut instance = running();
        let state = instance.mark_exited(ExitOutcome::Code(0)).unwrap();
        assert_eq!(state, ProcessState::Stopped);
    }

    #[test]
    fn test_user_stop_always_stopped() {
        let mut instance = running();
        assert!(!instance.mark_stopping().unwrap());
        assert!(instance.stop_requested_by_user());
        let state = instance.mark_exited(ExitOutcome::Signal(9)).unwrap();
        assert_eq!(state, ProcessState::Stopped);
        assert_eq!(instance.exit_code(), None);
    }

    #[test]
    fn test_revert_stopping() {
        let mut instance = running();
        let previous = instance.mark_stopping().unwrap();
        instance.revert_stopping(previous).unwrap();
        assert_eq!(instance.state(), ProcessState::Running);
        assert!(!instance.stop_requested_by_user());
    }

    #[test]
    fn test_retry_counting() {
        let mut instance = running();
        instance.mark_exited(ExitOutcome::Code(1)).unwrap();
        instance.mark_backoff().unwrap();
        instance.mark_starting(StartKind::Respawn).unwrap();
        instance.mark_running(43).unwrap();
        assert_eq!(instance.retry_count(), 1);
        assert_eq!(instance.generation(), 2);

        instance.mark_exited(ExitOutcome::Code(1)).unwrap();
        instance.mark_starting(StartKind::Fresh).unwrap();
        assert_eq!(instance.retry_count(), 0);
    }

    #[test]
    fn test_user_stop_clears_retry_count() {
        let mut instance = running();
        instance.mark_exited(ExitOutcome::Code(1)).unwrap();
        instance.mark_backoff().unwrap();
        instance.mark_starting(StartKind::Respawn).unwrap();
        instance.mark_running(43).unwrap();
        assert_eq!(instance.retry_count(), 1);

        instance.mark_stopping().unwrap();
        instance.mark_exited(ExitOutcome::Signal(9)).unwrap();
        assert_eq!(instance.retry_count(), 0);
    }

    #[test]
    fn test_retired_exit_is_stopped() {
        let mut instance = running();
        instance.mark_retired();
        let state = instance.mark_exited(ExitOutcome::Code(1)).unwrap();
        assert_eq!(state, ProcessState::Stopped);
        assert!(instance.stop_requested_by_user());
    }

    #[test]
    fn test_fresh_start_clears_user_stop() {
        let mut instance = running();
        instance.mark_stopping().unwrap();
        instance.mark_exited(ExitOutcome::Signal(9)).unwrap();
        instance.mark_starting(StartKind::Fresh).unwrap();
        assert!(!instance.stop_requested_by_user());
    }

    #[test]
    fn test_cancel_backoff() {
        let mut instance = running();
        instance.mark_exited(ExitOutcome::Code(1)).unwrap();
        instance.mark_backoff().unwrap();
        instance.cancel_backoff().unwrap();
        assert_eq!(instance.state(), ProcessState::Stopped);
        assert!(instance.stop_requested_by_user());
    }

    #[test]
    fn test_spawn_failure_is_fatal() {
        let mut instance = ProcessInstance::new();
        instance.mark_starting(StartKind::Fresh).unwrap();
        instance.mark_spawn_failed().unwrap();
        assert_eq!(instance.state(), ProcessState::Fatal);
        assert!(!instance.in_start());
    }

    #[test]
    fn test_fatal_after_exit() {
        let mut instance = running();
        instance.mark_exited(ExitOutcome::Code(1)).unwrap();
        instance.mark_fatal().unwrap();
        assert_eq!(instance.state(), ProcessState::Fatal);
    }

    #[test]
    fn test_last_run_duration() {
        let mut instance = running();
        assert_eq!(instance.last_run_duration(), None);
        instance.mark_exited(ExitOutcome::Code(0)).unwrap();
        assert!(instance.last_run_duration().is_some());
    }
}
