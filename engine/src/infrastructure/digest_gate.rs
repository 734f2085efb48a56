//! Content-hash gate for config reloads

use crate::infrastructure::config::{content_digest, parse_config, read_config_bytes, AgentConfig, ConfigError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Remembers the digest of the last applied config
#[derive(Debug, Default, Clone)]
pub struct DigestGate {
    last: Option<String>,
}

impl DigestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already applied digest
    pub fn with_applied(digest: impl Into<String>) -> Self {
        Self {
            last: Some(digest.into()),
        }
    }

    pub fn is_new(&self, digest: &str) -> bool {
        self.last.as_deref() != Some(digest)
    }

    pub fn record(&mut self, digest: impl Into<String>) {
        self.last = Some(digest.into());
    }
}

/// Re-reads the config file and yields it only when its content changed
#[derive(Debug)]
pub struct ConfigReloader {
    path: PathBuf,
    gate: DigestGate,
}

impl ConfigReloader {
    pub fn new(path: impl Into<PathBuf>, gate: DigestGate) -> Self {
        Self {
            path: path.into(),
            gate,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the content hash matches the last applied one.
    /// A parse failure leaves the gate untouched.
    pub fn reload(&mut self) -> Result<Option<AgentConfig>, ConfigError> {
        let bytes = read_config_bytes(&self.path)?;
        let digest = content_digest(&bytes);
        if !self.gate.is_new(&digest) {
            debug!(path = %self.path.display(), "Config content unchanged, skipping");
            return Ok(None);
        }
        let config = parse_config(&bytes)?;
        self.gate.record(digest);
        Ok(Some(config))
    }
}
