//! Program Registry
//! Last-applied desired-state list plus the name-indexed runtime entries

use crate::domain::{ProcessInstance, ProcessState, Program};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::debug;

/// Everything the supervisor mutates for one program, guarded as a unit
#[derive(Debug)]
pub struct ProgramSlot {
    pub program: Program,
    /// Created lazily on first start, reused afterwards
    pub instance: Option<ProcessInstance>,
    /// Task waiting on the current OS process
    pub monitor: Option<JoinHandle<()>>,
}

#[derive(Debug)]
pub struct ProgramEntry {
    name: String,
    slot: Mutex<ProgramSlot>,
}

impl ProgramEntry {
    fn new(program: Program) -> Self {
        Self {
            name: program.name().to_string(),
            slot: Mutex::new(ProgramSlot {
                program,
                instance: None,
                monitor: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Per-program exclusive section
    pub async fn lock(&self) -> MutexGuard<'_, ProgramSlot> {
        self.slot.lock().await
    }
}

/// Point-in-time view of one program, as pushed to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSnapshot {
    pub name: String,
    pub directory: String,
    pub command: String,
    pub args: Vec<String>,
    pub is_auto_start: bool,
    pub is_auto_restart: bool,
    pub max_restart_count: u32,
    pub pid: Option<u32>,
    pub start_time: Option<SystemTime>,
    pub stop_time: Option<SystemTime>,
    pub state: ProcessState,
    pub stop_by_user: bool,
    pub exit_code: Option<i32>,
    pub retry_count: u32,
}

impl ProgramSnapshot {
    pub fn capture(slot: &ProgramSlot) -> Self {
        let program = &slot.program;
        let instance = slot.instance.as_ref();
        Self {
            name: program.name().to_string(),
            directory: program.directory().to_string(),
            command: program.command().to_string(),
            args: program.args().to_vec(),
            is_auto_start: program.is_auto_start(),
            is_auto_restart: program.is_auto_restart(),
            max_restart_count: program.max_restart_count(),
            pid: instance.and_then(|i| i.pid()),
            start_time: instance.and_then(|i| i.start_time()),
            stop_time: instance.and_then(|i| i.stop_time()),
            state: instance.map_or(ProcessState::Unknown, |i| i.state()),
            stop_by_user: instance.is_some_and(|i| i.stop_requested_by_user()),
            exit_code: instance.and_then(|i| i.exit_code()),
            retry_count: instance.map_or(0, |i| i.retry_count()),
        }
    }
}

/// Thread-safe registry of programs
///
/// The list and the map are separate locks; neither is held across an await.
/// Callers serialize `replace` against diffing themselves (see `Reconciler`).
#[derive(Debug, Default)]
pub struct ProgramRegistry {
    programs: RwLock<Vec<Program>>,
    entries: RwLock<HashMap<String, Arc<ProgramEntry>>>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last-applied desired-state list
    pub fn desired(&self) -> Vec<Program> {
        self.programs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<ProgramEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// All entries, including ones whose removal is still in progress
    pub fn entries(&self) -> Vec<Arc<ProgramEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Swap in a new desired-state list.
    ///
    /// Existing entries keep their runtime instance and receive the new
    /// definition; new names get a fresh entry. Names that disappeared keep
    /// their entry until `remove` is called for them.
    pub async fn replace(&self, programs: Vec<Program>) {
        let mut fresh = Vec::new();
        let mut updated = Vec::new();
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            for program in &programs {
                match entries.get(program.name()) {
                    Some(entry) => updated.push((entry.clone(), program.clone())),
                    None => fresh.push(program.clone()),
                }
            }
        }

        for (entry, program) in updated {
            entry.lock().await.program = program;
        }

        {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            for program in fresh {
                debug!(program = %program.name(), "Registering program");
                entries
                    .entry(program.name().to_string())
                    .or_insert_with(|| Arc::new(ProgramEntry::new(program)));
            }
        }

        *self.programs.write().unwrap_or_else(PoisonError::into_inner) = programs;
    }

    pub fn remove(&self, name: &str) -> Option<Arc<ProgramEntry>> {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        if removed.is_some() {
            debug!(program = %name, "Unregistered program");
        }
        removed
    }

    /// Runtime records in the order of the last-applied list
    pub async fn snapshot(&self) -> Vec<ProgramSnapshot> {
        let ordered: Vec<Arc<ProgramEntry>> = {
            let programs = self.programs.read().unwrap_or_else(PoisonError::into_inner);
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            programs
                .iter()
                .filter_map(|p| entries.get(p.name()).cloned())
                .collect()
        };

        let mut snapshot = Vec::with_capacity(ordered.len());
        for entry in ordered {
            let slot = entry.lock().await;
            snapshot.push(ProgramSnapshot::capture(&slot));
        }
        snapshot
    }
}
