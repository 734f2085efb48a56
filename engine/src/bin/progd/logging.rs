//! Logging initialisation
//!
//! Console output always; a plain-text file sink under `logging.directory`
//! unless the directory is empty.

use progd_engine::constants::logging::{DEFAULT_LOG_LEVEL, LOG_FILE_NAME};
use progd_engine::infrastructure::LoggingConfig;
use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_LEVEL_ENV: &str = "PROGD_LOG_LEVEL";

type InitError = Box<dyn std::error::Error + Send + Sync>;

/// Priority: PROGD_LOG_LEVEL > RUST_LOG > config file > info
pub fn resolve_level(configured: Option<&str>) -> String {
    let non_empty = |v: &String| !v.trim().is_empty();
    env::var(LOG_LEVEL_ENV)
        .ok()
        .filter(non_empty)
        .or_else(|| env::var("RUST_LOG").ok().filter(non_empty))
        .or_else(|| configured.map(str::to_string).filter(non_empty))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// Install the global subscriber. The returned guard flushes the file sink on drop
/// and must live as long as the process.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>, InitError> {
    let level = resolve_level(config.level.as_deref());
    let (filter, rejected) = match EnvFilter::try_new(&level) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(DEFAULT_LOG_LEVEL), Some(e)),
    };

    let guard = if config.directory.is_empty() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()?;
        None
    } else {
        std::fs::create_dir_all(&config.directory)?;
        let appender = tracing_appender::rolling::never(&config.directory, LOG_FILE_NAME);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .try_init()?;
        Some(guard)
    };

    if let Some(e) = rejected {
        tracing::warn!(level = %level, error = %e, "Invalid log level, using {}", DEFAULT_LOG_LEVEL);
    }
    Ok(guard)
}
