//! Configuration loading from the desired-state YAML file
//!
//! One file holds the listen address, logging settings and the program list.
//! Loading also returns a content digest so unchanged files can be skipped.

use crate::constants::{logging, process, transport};
use crate::domain::{AutoStartMode, Program};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default, alias = "grpcServer")]
    pub grpc_server: GrpcServerConfig,

    #[serde(default, alias = "autoStartMode")]
    pub auto_start_mode: AutoStartMode,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default, alias = "program")]
    pub programs: Vec<ProgramConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrpcServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GrpcServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl GrpcServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: Option<String>,

    /// Empty disables the file sink
    #[serde(default = "default_log_directory")]
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            directory: default_log_directory(),
        }
    }
}

/// Program configuration from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramConfig {
    pub name: String,

    #[serde(default)]
    pub directory: String,

    #[serde(default)]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default, alias = "isAutoStart", alias = "IsAutoStart")]
    pub is_auto_start: bool,

    #[serde(default, alias = "isAutoRestart", alias = "IsAutoRestart")]
    pub is_auto_restart: bool,

    #[serde(default, alias = "maxRestartCount", alias = "MaxRestartCount")]
    pub max_restart_count: u32,

    #[serde(default)]
    pub output: Option<String>,

    #[serde(default = "default_runtime_success_sec", alias = "runtimeSuccessSec")]
    pub runtime_success_sec: u64,
}

impl ProgramConfig {
    pub fn to_program(&self) -> Program {
        Program::builder(&self.name, &self.directory, &self.command)
            .args(self.args.clone())
            .output(self.output.clone())
            .auto_start(self.is_auto_start)
            .auto_restart(self.is_auto_restart)
            .max_restart_count(self.max_restart_count)
            .runtime_success_sec(self.runtime_success_sec)
            .build()
    }
}

impl AgentConfig {
    /// Desired-state list, in file order
    pub fn programs(&self) -> Vec<Program> {
        self.programs.iter().map(ProgramConfig::to_program).collect()
    }
}

/// A parsed config together with the digest of the bytes it came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AgentConfig,
    pub digest: String,
}

fn default_host() -> String {
    transport::DEFAULT_GRPC_HOST.to_string()
}

fn default_port() -> u16 {
    transport::DEFAULT_GRPC_PORT
}

fn default_log_directory() -> String {
    logging::DEFAULT_LOG_DIRECTORY.to_string()
}

fn default_runtime_success_sec() -> u64 {
    process::DEFAULT_RUNTIME_SUCCESS_SEC
}

/// SHA-256 of the raw file content, hex encoded
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn parse_config(bytes: &[u8]) -> Result<AgentConfig, ConfigError> {
    // an empty file is an empty desired state
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(AgentConfig::default());
    }
    let config: AgentConfig = serde_yaml::from_slice(bytes)?;
    if config.grpc_server.host.is_empty() {
        return Err(ConfigError::Invalid("grpc_server.host cannot be empty".to_string()));
    }
    Ok(config)
}

pub fn read_config_bytes(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let bytes = read_config_bytes(path)?;
    let config = parse_config(&bytes)?;
    Ok(LoadedConfig {
        config,
        digest: content_digest(&bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
grpc_server:
  host: 0.0.0.0
  port: 7000
auto_start_mode: opt_out
logging:
  level: debug
  directory: ""
programs:
  - name: web
    directory: /srv/app
    command: run.sh
    args: ["--port", "8080"]
    is_auto_start: true
    is_auto_restart: true
    max_restart_count: 3
    output: /var/log/web.log
  - name: worker
    directory: /srv/worker
    command: worker
"#;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(SAMPLE.as_bytes()).unwrap();
        assert_eq!(config.grpc_server.address(), "0.0.0.0:7000");
        assert_eq!(config.auto_start_mode, AutoStartMode::OptOut);
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert_eq!(config.logging.directory, "");

        let programs = config.programs();
        assert_eq!(programs.len(), 2);
        let web = &programs[0];
        assert_eq!(web.name(), "web");
        assert_eq!(web.args(), ["--port", "8080"]);
        assert!(web.is_auto_start());
        assert!(web.is_auto_restart());
        assert_eq!(web.max_restart_count(), 3);
        assert_eq!(web.output(), Some("/var/log/web.log"));
        assert_eq!(web.runtime_success_sec(), process::DEFAULT_RUNTIME_SUCCESS_SEC);

        let worker = &programs[1];
        assert!(!worker.is_auto_start());
        assert_eq!(worker.output(), None);
    }

    #[test]
    fn test_defaults() {
        let config = parse_config(b"programs: []").unwrap();
        assert_eq!(config.grpc_server.host, transport::DEFAULT_GRPC_HOST);
        assert_eq!(config.grpc_server.port, transport::DEFAULT_GRPC_PORT);
        assert_eq!(config.auto_start_mode, AutoStartMode::OptIn);
        assert_eq!(config.logging.directory, logging::DEFAULT_LOG_DIRECTORY);
        assert!(config.logging.level.is_none());
    }

    #[test]
    fn test_camel_case_aliases() {
        let yaml = r#"
grpcServer:
  port: 9191
program:
  - name: web
    directory: /srv/app
    command: run.sh
    isAutoStart: true
    isAutoRestart: true
    maxRestartCount: 2
"#;
        let config = parse_config(yaml.as_bytes()).unwrap();
        assert_eq!(config.grpc_server.port, 9191);
        let programs = config.programs();
        assert!(programs[0].is_auto_start());
        assert!(programs[0].is_auto_restart());
        assert_eq!(programs[0].max_restart_count(), 2);
    }

    #[test]
    fn test_pascal_case_program_keys() {
        let yaml = r#"
programs:
  - name: web
    directory: /srv/app
    command: run.sh
    IsAutoStart: true
    IsAutoRestart: true
    MaxRestartCount: 4
"#;
        let programs = parse_config(yaml.as_bytes()).unwrap().programs();
        assert!(programs[0].is_auto_start());
        assert!(programs[0].is_auto_restart());
        assert_eq!(programs[0].max_restart_count(), 4);
    }

    #[test]
    fn test_empty_file_is_empty_state() {
        let config = parse_config(b"  \n").unwrap();
        assert!(config.programs.is_empty());
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            parse_config(b"programs: [unclosed"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            parse_config(b"grpc_server:\n  host: \"\"\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_digest_is_stable() {
        let a = content_digest(SAMPLE.as_bytes());
        assert_eq!(a, content_digest(SAMPLE.as_bytes()));
        assert_eq!(a.len(), 64);
        assert_ne!(a, content_digest(b"programs: []"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progd.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.digest, content_digest(SAMPLE.as_bytes()));
        assert_eq!(loaded.config.programs.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_example_config_parses() {
        let example = include_str!("../../../config/progd.example.yaml");
        let config = parse_config(example.as_bytes()).unwrap();
        assert_eq!(config.grpc_server.address(), "127.0.0.1:9090");
        assert_eq!(config.auto_start_mode, AutoStartMode::OptIn);

        let programs = config.programs();
        assert_eq!(programs.len(), 2);
        assert!(programs.iter().all(|p| p.check().is_ok()));
        assert_eq!(programs[1].runtime_success_sec(), 120);
    }
}
