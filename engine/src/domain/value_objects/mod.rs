pub mod exit_outcome;
pub mod process_state;

pub use exit_outcome::{ExitOutcome, StartKind};
pub use process_state::ProcessState;
