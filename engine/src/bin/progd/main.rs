mod cli;
mod logging;

use clap::Parser;
use progd_engine::adapters::grpc;
use progd_engine::application::Agent;
use progd_engine::infrastructure::{
    load_config, ConfigReloader, ConfigWatcher, DigestGate, LoggingConfig, TokioProcessExecutor,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = cli::Args::parse();

    let loaded = match load_config(&args.configuration) {
        Ok(loaded) => loaded,
        Err(e) => {
            let console_only = LoggingConfig {
                directory: String::new(),
                ..LoggingConfig::default()
            };
            let _guard = logging::init(&console_only)?;
            error!(path = %args.configuration.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    let config = loaded.config;
    let _log_guard = logging::init(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        path = %args.configuration.display(),
        programs = config.programs.len(),
        auto_start_mode = ?config.auto_start_mode,
        "Starting progd"
    );

    let agent = Agent::new(
        Arc::new(TokioProcessExecutor::new()),
        config.auto_start_mode,
        config.grpc_server.host.clone(),
    );

    let listener = match grpc::bind(&config.grpc_server.address()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(address = %config.grpc_server.address(), error = %e, "Failed to bind gRPC listener");
            return Err(e.into());
        }
    };

    agent.apply(config.programs()).await;

    let cancel = CancellationToken::new();
    let (changes_tx, changes_rx) = mpsc::unbounded_channel();
    let _watcher = match ConfigWatcher::start(&args.configuration, changes_tx) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!(error = %e, "Config hot reload disabled");
            None
        }
    };
    let reloader = ConfigReloader::new(
        args.configuration.clone(),
        DigestGate::with_applied(loaded.digest),
    );
    let reload_task = agent.spawn_reload_loop(reloader, changes_rx, cancel.clone());

    let closing = agent.closing_token();
    let served = grpc::serve_with_shutdown(listener, agent.control_service(), async move {
        shutdown_signal().await;
        closing.cancel();
    })
    .await;

    cancel.cancel();
    if let Err(e) = reload_task.await {
        warn!(error = %e, "Config reload task ended abnormally");
    }
    agent.shutdown().await;

    if let Err(e) = served {
        error!(error = %e, "gRPC server failed");
        return Err(e);
    }
    info!("progd stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
