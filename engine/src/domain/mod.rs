pub mod entities;
pub mod error;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use entities::{ProcessInstance, Program};
pub use error::{DomainError, Result};
pub use services::{
    AutoStartMode, ProcessSupervisor, ProgramRegistry, ProgramSnapshot, ReconcilePlan, Reconciler,
};
pub use value_objects::{ExitOutcome, ProcessState, StartKind};
