//! Agent
//! Composition root: wires the registry, supervisor, reconciler and the
//! control-stream adapter together, and owns the config reload loop.

use crate::adapters::grpc::{
    ChannelNotifier, CommandDispatcher, ControlChannel, ControlService, LifecycleAction,
    LifecycleHandler, SubscriptionHandler,
};
use crate::constants::reload;
use crate::domain::ports::ProcessExecutor;
use crate::domain::{
    AutoStartMode, ProcessSupervisor, Program, ProgramRegistry, ReconcilePlan, Reconciler,
};
use crate::infrastructure::ConfigReloader;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct Agent {
    supervisor: ProcessSupervisor,
    reconciler: Arc<Reconciler>,
    channel: Arc<ControlChannel>,
    dispatcher: Arc<CommandDispatcher>,
    closing: CancellationToken,
}

impl Agent {
    /// `client_ip` is the listen host, stamped on outbound envelopes
    pub fn new(
        executor: Arc<dyn ProcessExecutor>,
        mode: AutoStartMode,
        client_ip: impl Into<String>,
    ) -> Self {
        let channel = Arc::new(ControlChannel::new(client_ip));
        let registry = Arc::new(ProgramRegistry::new());
        let notifier = Arc::new(ChannelNotifier::new(channel.clone()));
        let supervisor = ProcessSupervisor::new(registry, executor, notifier);
        let reconciler = Arc::new(Reconciler::new(supervisor.clone(), mode));

        let mut dispatcher = CommandDispatcher::new();
        for action in [
            LifecycleAction::Start,
            LifecycleAction::Stop,
            LifecycleAction::Restart,
        ] {
            dispatcher.register(Arc::new(LifecycleHandler::new(
                action,
                supervisor.clone(),
                channel.clone(),
            )));
        }
        dispatcher.register(Arc::new(SubscriptionHandler));

        Self {
            supervisor,
            reconciler,
            channel,
            dispatcher: Arc::new(dispatcher),
            closing: CancellationToken::new(),
        }
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn channel(&self) -> &Arc<ControlChannel> {
        &self.channel
    }

    pub fn control_service(&self) -> ControlService {
        ControlService::new(
            self.channel.clone(),
            self.dispatcher.clone(),
            self.closing.clone(),
        )
    }

    /// End every open control stream. Call before a graceful server shutdown.
    pub fn close_streams(&self) {
        self.closing.cancel();
    }

    /// Token cancelled by [`Agent::close_streams`]
    pub fn closing_token(&self) -> CancellationToken {
        self.closing.clone()
    }

    /// Reconcile against a new desired-state list
    pub async fn apply(&self, programs: Vec<Program>) -> ReconcilePlan {
        self.reconciler.apply(programs).await
    }

    /// Re-read the config on every change event and reconcile when its content changed.
    /// Events arriving within the debounce window collapse into one read.
    pub fn spawn_reload_loop(
        &self,
        mut reloader: ConfigReloader,
        mut changes: mpsc::UnboundedReceiver<()>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let reconciler = self.reconciler.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = changes.recv() => {
                        if event.is_none() {
                            break;
                        }
                        tokio::time::sleep(Duration::from_millis(reload::DEBOUNCE_MS)).await;
                        while changes.try_recv().is_ok() {}

                        match reloader.reload() {
                            Ok(Some(config)) => {
                                info!(path = %reloader.path().display(), "Config changed, reconciling");
                                if config.auto_start_mode != reconciler.mode() {
                                    warn!(
                                        configured = ?config.auto_start_mode,
                                        active = ?reconciler.mode(),
                                        "auto_start_mode changes take effect after restart"
                                    );
                                }
                                reconciler.apply(config.programs()).await;
                            }
                            Ok(None) => {}
                            Err(e) => warn!(
                                path = %reloader.path().display(),
                                error = %e,
                                "Config reload failed, keeping current state"
                            ),
                        }
                    }
                }
            }
            debug!("Config reload loop stopped");
        })
    }

    /// Stop every supervised program
    pub async fn shutdown(&self) {
        info!("Stopping all programs");
        self.supervisor.stop_all().await;
    }
}
