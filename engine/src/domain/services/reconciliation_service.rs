//! Reconciliation
//! Diffs a new desired-state list against the last-applied one and drives the
//! supervisor to converge: add, then remove, then restart.

use crate::domain::services::{ProcessSupervisor, ProgramRegistry};
use crate::domain::Program;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Which value of `is_auto_start` makes a program managed by reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoStartMode {
    /// `is_auto_start: true` programs are managed
    #[default]
    OptIn,
    /// `is_auto_start: true` programs are left alone (legacy agent behaviour)
    OptOut,
}

impl AutoStartMode {
    pub fn admits(&self, program: &Program) -> bool {
        match self {
            Self::OptIn => program.is_auto_start(),
            Self::OptOut => !program.is_auto_start(),
        }
    }
}

/// The actions one reconciliation pass will take
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub to_add: Vec<String>,
    pub to_remove: Vec<String>,
    pub to_restart: Vec<String>,
}

impl ReconcilePlan {
    /// Compare by exact, case-sensitive name
    pub fn compute(old: &[Program], new: &[Program]) -> Self {
        let mut plan = Self::default();

        for program in new {
            match old.iter().find(|o| o.name() == program.name()) {
                None => plan.to_add.push(program.name().to_string()),
                Some(previous) if previous.invocation_differs(program) => {
                    plan.to_restart.push(program.name().to_string())
                }
                Some(_) => {}
            }
        }

        for program in old {
            if !new.iter().any(|n| n.name() == program.name()) {
                plan.to_remove.push(program.name().to_string());
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty() && self.to_restart.is_empty()
    }
}

/// Single entry point for desired-state changes. Passes are serialized.
pub struct Reconciler {
    registry: Arc<ProgramRegistry>,
    supervisor: ProcessSupervisor,
    mode: AutoStartMode,
    pass: Mutex<()>,
}

impl Reconciler {
    pub fn new(supervisor: ProcessSupervisor, mode: AutoStartMode) -> Self {
        Self {
            registry: supervisor.registry().clone(),
            supervisor,
            mode,
            pass: Mutex::new(()),
        }
    }

    pub fn mode(&self) -> AutoStartMode {
        self.mode
    }

    /// Drop invalid, unmanaged and duplicate entries
    pub fn admissible(&self, desired: Vec<Program>) -> Vec<Program> {
        let mut seen = HashSet::new();
        desired
            .into_iter()
            .filter(|program| {
                if let Err(e) = program.check() {
                    warn!(program = %program.name(), error = %e, "Skipping invalid program");
                    return false;
                }
                if !self.mode.admits(program) {
                    debug!(
                        program = %program.name(),
                        is_auto_start = program.is_auto_start(),
                        mode = ?self.mode,
                        "Program not managed by reconciliation"
                    );
                    return false;
                }
                if !seen.insert(program.name().to_string()) {
                    warn!(program = %program.name(), "Skipping duplicate program name");
                    return false;
                }
                true
            })
            .collect()
    }

    /// Converge the running set toward `desired`
    pub async fn apply(&self, desired: Vec<Program>) -> ReconcilePlan {
        let _pass = self.pass.lock().await;

        let desired = self.admissible(desired);
        let previous = self.registry.desired();
        let plan = ReconcilePlan::compute(&previous, &desired);

        // swap only after the diff against the old list is complete
        self.registry.replace(desired).await;

        if plan.is_empty() {
            debug!("Desired state unchanged");
            return plan;
        }
        info!(
            to_add = ?plan.to_add,
            to_remove = ?plan.to_remove,
            to_restart = ?plan.to_restart,
            "Reconciling programs"
        );

        for name in &plan.to_add {
            if let Err(e) = self.supervisor.start(name).await {
                error!(program = %name, error = %e, "Failed to start program");
            }
        }
        for name in &plan.to_remove {
            self.supervisor.retire(name).await;
        }
        for name in &plan.to_restart {
            if let Err(e) = self.supervisor.restart(name).await {
                error!(program = %name, error = %e, "Failed to restart program");
            }
        }

        plan
    }
}
