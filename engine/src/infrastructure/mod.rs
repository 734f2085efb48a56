//! Infrastructure Layer
//!
//! Driven adapters behind the domain ports, plus configuration plumbing.
//!
//! - `TokioProcessExecutor`: real OS processes
//! - `config`: desired-state YAML file and its content digest
//! - `DigestGate` / `ConfigReloader`: skip reloads whose content did not change
//! - `ConfigWatcher`: filesystem change trigger for hot reload

pub mod config;
pub mod config_watcher;
pub mod digest_gate;
pub mod tokio_executor;

pub use config::{
    content_digest, load_config, parse_config, AgentConfig, ConfigError, GrpcServerConfig,
    LoadedConfig, LoggingConfig, ProgramConfig,
};
pub use config_watcher::{ConfigWatcher, WatchError};
pub use digest_gate::{ConfigReloader, DigestGate};
pub use tokio_executor::TokioProcessExecutor;
