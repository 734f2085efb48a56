pub mod change_notifier;
pub mod process_executor;

pub use change_notifier::{ChangeNotifier, NoopNotifier};
pub use process_executor::{ProcessExecutor, ProcessExitHandle, SpawnConfig, SpawnResult};

#[cfg(test)]
pub use process_executor::MockProcessExecutor;
