pub mod process_instance;
pub mod program;

pub use process_instance::ProcessInstance;
pub use program::{Program, ProgramBuilder};
