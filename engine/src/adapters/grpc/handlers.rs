//! Inbound command handlers
//!
//! Start, stop and restart share one handler parameterized by [`LifecycleAction`].
//! A rejected command is logged and answered with a `commandError` envelope
//! that echoes the `requestId` header when present.

use super::control_channel::ControlChannel;
use super::dispatcher::CommandHandler;
use super::mappers::{
    decode_body, encode_body, envelope, payload_header, CommandErrorBody, ProgramCommandBody,
};
use crate::constants::protocol::{
    COMMAND_ERROR, REQUEST_ID_HEADER, RESTART_PROGRAM, START_PROGRAM, STOP_PROGRAM,
    SUBSCRIPTION_PROGRAM,
};
use crate::domain::{DomainError, ProcessSupervisor};
use crate::proto::Payload;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Start,
    Stop,
    Restart,
}

impl LifecycleAction {
    pub fn envelope_type(self) -> &'static str {
        match self {
            Self::Start => START_PROGRAM,
            Self::Stop => STOP_PROGRAM,
            Self::Restart => RESTART_PROGRAM,
        }
    }
}

pub struct LifecycleHandler {
    action: LifecycleAction,
    supervisor: ProcessSupervisor,
    channel: Arc<ControlChannel>,
}

impl LifecycleHandler {
    pub fn new(
        action: LifecycleAction,
        supervisor: ProcessSupervisor,
        channel: Arc<ControlChannel>,
    ) -> Self {
        Self {
            action,
            supervisor,
            channel,
        }
    }

    async fn execute(&self, name: &str) -> Result<(), DomainError> {
        match self.action {
            LifecycleAction::Start => {
                let pid = self.supervisor.start(name).await?;
                info!(program = %name, pid, "Program started on request");
            }
            LifecycleAction::Stop => {
                self.supervisor.stop(name).await?;
                info!(program = %name, "Program stopped on request");
            }
            LifecycleAction::Restart => {
                let pid = self.supervisor.restart(name).await?;
                info!(program = %name, pid, "Program restarted on request");
            }
        }
        Ok(())
    }

    async fn report_failure(&self, payload: &Payload, name: &str, err: &DomainError) {
        let command = self.action.envelope_type();
        error!(command, program = %name, error = %err, "Command failed");

        let body = CommandErrorBody {
            command: command.to_string(),
            name: name.to_string(),
            message: err.to_string(),
        };
        let body = match encode_body(&body) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "Failed to encode command error");
                return;
            }
        };
        let mut headers = HashMap::new();
        if let Some(request_id) = payload_header(payload, REQUEST_ID_HEADER) {
            headers.insert(REQUEST_ID_HEADER.to_string(), request_id.to_string());
        }
        self.channel
            .send(envelope(COMMAND_ERROR, self.channel.client_ip(), headers, body))
            .await;
    }
}

#[async_trait]
impl CommandHandler for LifecycleHandler {
    fn declared_type(&self) -> &str {
        self.action.envelope_type()
    }

    async fn handle(&self, payload: &Payload) {
        let name = match decode_body::<ProgramCommandBody>(payload.body.as_ref()) {
            Ok(body) if !body.name.is_empty() => body.name,
            Ok(_) => {
                let err = DomainError::InvalidBody("program name is empty".to_string());
                self.report_failure(payload, "", &err).await;
                return;
            }
            Err(err) => {
                self.report_failure(payload, "", &err).await;
                return;
            }
        };

        if let Err(err) = self.execute(&name).await {
            self.report_failure(payload, &name, &err).await;
        }
    }
}

/// Inbound `subscriptionProgram` is accepted and ignored; pushes are unsolicited
#[derive(Debug, Default)]
pub struct SubscriptionHandler;

#[async_trait]
impl CommandHandler for SubscriptionHandler {
    fn declared_type(&self) -> &str {
        SUBSCRIPTION_PROGRAM
    }

    async fn handle(&self, _payload: &Payload) {
        debug!("Ignoring inbound subscription envelope");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::grpc::mappers::payload_type;
    use crate::domain::ports::{
        MockProcessExecutor, NoopNotifier, ProcessExecutor, SpawnResult,
    };
    use crate::domain::{ExitOutcome, ProgramRegistry, Program};
    use crate::proto::Metadata;
    use tokio::sync::mpsc;

    async fn supervisor_with(executor: MockProcessExecutor) -> ProcessSupervisor {
        let registry = Arc::new(ProgramRegistry::new());
        registry
            .replace(vec![Program::builder("web", "/tmp", "sleep").build()])
            .await;
        let executor: Arc<dyn ProcessExecutor> = Arc::new(executor);
        ProcessSupervisor::new(registry, executor, Arc::new(NoopNotifier))
    }

    async fn connected_channel() -> (Arc<ControlChannel>, mpsc::Receiver<Result<Payload, tonic::Status>>) {
        let channel = Arc::new(ControlChannel::new("127.0.0.1"));
        let (tx, rx) = mpsc::channel(8);
        channel.replace(tx).await;
        (channel, rx)
    }

    fn command(kind: &str, body: &[u8], request_id: Option<&str>) -> Payload {
        let mut headers = HashMap::new();
        if let Some(id) = request_id {
            headers.insert(REQUEST_ID_HEADER.to_string(), id.to_string());
        }
        Payload {
            metadata: Some(Metadata {
                r#type: kind.to_string(),
                client_ip: "10.1.1.1".to_string(),
                headers,
            }),
            body: Some(prost_types::Any {
                type_url: String::new(),
                value: body.to_vec(),
            }),
        }
    }

    #[tokio::test]
    async fn test_start_spawns_program() {
        let mut executor = MockProcessExecutor::new();
        executor.expect_spawn().times(1).returning(|config| {
            assert_eq!(config.name, "web");
            Ok(SpawnResult {
                pid: 77,
                exit_handle: Box::pin(std::future::pending::<
                    Result<ExitOutcome, DomainError>,
                >()),
            })
        });
        let supervisor = supervisor_with(executor).await;
        let (channel, mut rx) = connected_channel().await;

        let handler = LifecycleHandler::new(LifecycleAction::Start, supervisor.clone(), channel);
        handler
            .handle(&command(START_PROGRAM, br#"{"name":"web"}"#, None))
            .await;

        let snapshot = supervisor.snapshot().await;
        assert_eq!(snapshot[0].pid, Some(77));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_program_reports_error_with_request_id() {
        let supervisor = supervisor_with(MockProcessExecutor::new()).await;
        let (channel, mut rx) = connected_channel().await;

        let handler = LifecycleHandler::new(LifecycleAction::Stop, supervisor, channel);
        handler
            .handle(&command(STOP_PROGRAM, br#"{"name":"ghost"}"#, Some("req-9")))
            .await;

        let reply = rx.recv().await.unwrap().unwrap();
        assert_eq!(payload_type(&reply), COMMAND_ERROR);
        assert_eq!(payload_header(&reply, REQUEST_ID_HEADER), Some("req-9"));

        let body: CommandErrorBody = decode_body(reply.body.as_ref()).unwrap();
        assert_eq!(body.command, STOP_PROGRAM);
        assert_eq!(body.name, "ghost");
        assert!(body.message.contains("ghost"));
    }

    #[tokio::test]
    async fn test_malformed_body_reports_error() {
        let supervisor = supervisor_with(MockProcessExecutor::new()).await;
        let (channel, mut rx) = connected_channel().await;

        let handler = LifecycleHandler::new(LifecycleAction::Restart, supervisor, channel);
        handler.handle(&command(RESTART_PROGRAM, b"{", None)).await;
        handler.handle(&command(RESTART_PROGRAM, b"{}", None)).await;

        for _ in 0..2 {
            let reply = rx.recv().await.unwrap().unwrap();
            assert_eq!(payload_type(&reply), COMMAND_ERROR);
            assert_eq!(payload_header(&reply, REQUEST_ID_HEADER), None);
        }
    }

    #[tokio::test]
    async fn test_stop_of_idle_program_is_silent() {
        let supervisor = supervisor_with(MockProcessExecutor::new()).await;
        let (channel, mut rx) = connected_channel().await;

        let handler = LifecycleHandler::new(LifecycleAction::Stop, supervisor, channel);
        handler
            .handle(&command(STOP_PROGRAM, br#"{"name":"web"}"#, None))
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_declared_types() {
        assert_eq!(LifecycleAction::Start.envelope_type(), "startProgram");
        assert_eq!(LifecycleAction::Stop.envelope_type(), "stopProgram");
        assert_eq!(LifecycleAction::Restart.envelope_type(), "restartProgram");
        assert_eq!(SubscriptionHandler.declared_type(), "subscriptionProgram");
    }
}
