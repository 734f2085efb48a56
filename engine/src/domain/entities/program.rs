//! Program entity
//! One desired-state record: what to run, where, and how to supervise it

use crate::constants::process::DEFAULT_RUNTIME_SUCCESS_SEC;
use crate::domain::DomainError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    // Identity
    name: String,

    // Invocation
    directory: String,
    command: String,
    args: Vec<String>,
    output: Option<String>,

    // Supervision
    is_auto_start: bool,
    is_auto_restart: bool,
    max_restart_count: u32,
    runtime_success_sec: u64,
}

impl Program {
    /// Create a builder for a program definition
    ///
    /// # Example
    /// ```
    /// use progd_engine::domain::Program;
    ///
    /// let program = Program::builder("web", "/srv/app", "run.sh")
    ///     .auto_start(true)
    ///     .auto_restart(true)
    ///     .max_restart_count(3)
    ///     .build();
    /// assert!(program.check().is_ok());
    /// ```
    pub fn builder(
        name: impl Into<String>,
        directory: impl Into<String>,
        command: impl Into<String>,
    ) -> ProgramBuilder {
        ProgramBuilder {
            program: Program {
                name: name.into(),
                directory: directory.into(),
                command: command.into(),
                args: Vec::new(),
                output: None,
                is_auto_start: false,
                is_auto_restart: false,
                max_restart_count: 0,
                runtime_success_sec: DEFAULT_RUNTIME_SUCCESS_SEC,
            },
        }
    }

    // ===== Getters =====

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn is_auto_start(&self) -> bool {
        self.is_auto_start
    }

    pub fn is_auto_restart(&self) -> bool {
        self.is_auto_restart
    }

    pub fn max_restart_count(&self) -> u32 {
        self.max_restart_count
    }

    pub fn runtime_success_sec(&self) -> u64 {
        self.runtime_success_sec
    }

    // ===== Business logic =====

    /// Reject definitions that cannot be spawned
    pub fn check(&self) -> Result<(), DomainError> {
        if self.name.is_empty() {
            return Err(DomainError::InvalidProgram {
                name: self.name.clone(),
                reason: "name cannot be empty".to_string(),
            });
        }
        if self.directory.is_empty() {
            return Err(DomainError::InvalidProgram {
                name: self.name.clone(),
                reason: "directory cannot be empty".to_string(),
            });
        }
        if self.command.is_empty() {
            return Err(DomainError::InvalidProgram {
                name: self.name.clone(),
                reason: "command cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// True when `other` would run a different process under the same name
    pub fn invocation_differs(&self, other: &Program) -> bool {
        self.directory != other.directory
            || self.command != other.command
            || self.args != other.args
    }
}

pub struct ProgramBuilder {
    program: Program,
}

impl ProgramBuilder {
    pub fn args(mut self, args: Vec<String>) -> Self {
        self.program.args = args;
        self
    }

    pub fn output(mut self, output: Option<String>) -> Self {
        self.program.output = output.filter(|o| !o.is_empty());
        self
    }

    pub fn auto_start(mut self, enabled: bool) -> Self {
        self.program.is_auto_start = enabled;
        self
    }

    pub fn auto_restart(mut self, enabled: bool) -> Self {
        self.program.is_auto_restart = enabled;
        self
    }

    pub fn max_restart_count(mut self, count: u32) -> Self {
        self.program.max_restart_count = count;
        self
    }

    pub fn runtime_success_sec(mut self, secs: u64) -> Self {
        self.program.runtime_success_sec = secs;
        self
    }

    pub fn build(self) -> Program {
        self.program
    }
}
