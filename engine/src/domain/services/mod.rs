pub mod process_supervision_service;
pub mod program_registry;
pub mod reconciliation_service;

pub use process_supervision_service::ProcessSupervisor;
pub use program_registry::{ProgramEntry, ProgramRegistry, ProgramSlot, ProgramSnapshot};
pub use reconciliation_service::{AutoStartMode, ReconcilePlan, Reconciler};
