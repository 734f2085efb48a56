//! Shared utilities for control-stream tests
//!
//! Each test gets its own agent serving on an ephemeral port, so tests can run
//! in parallel. [`TestAgent::stop`] shuts the server down and stops every
//! program it started.

#![allow(dead_code)]

use progd_engine::adapters::grpc::{self, mappers::ProgramStatus};
use progd_engine::application::Agent;
use progd_engine::constants::protocol::{JSON_TYPE_URL, REQUEST_ID_HEADER};
use progd_engine::domain::{AutoStartMode, Program};
use progd_engine::infrastructure::TokioProcessExecutor;
use progd_engine::proto::bi_request_stream_client::BiRequestStreamClient;
use progd_engine::proto::{Metadata, Payload};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Streaming;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestAgent {
    pub agent: Agent,
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

impl TestAgent {
    pub async fn stop(mut self) {
        self.agent.close_streams();
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            let _ = server.await;
        }
        self.agent.shutdown().await;
    }
}

/// Long-running program managed by reconciliation
pub fn sleeper(name: &str) -> Program {
    Program::builder(name, "/tmp", "sleep")
        .args(vec!["60".to_string()])
        .auto_start(true)
        .build()
}

pub async fn start_agent(programs: Vec<Program>) -> TestAgent {
    let agent = Agent::new(
        std::sync::Arc::new(TokioProcessExecutor::new()),
        AutoStartMode::OptIn,
        "127.0.0.1",
    );
    let listener = grpc::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    agent.apply(programs).await;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let service = agent.control_service();
    let server = tokio::spawn(async move {
        grpc::serve_with_shutdown(listener, service, async {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    TestAgent {
        agent,
        addr,
        shutdown: Some(shutdown_tx),
        server: Some(server),
    }
}

pub struct Controller {
    pub outbound: mpsc::Sender<Payload>,
    pub inbound: Streaming<Payload>,
}

impl Controller {
    pub async fn send(&self, payload: Payload) {
        self.outbound.send(payload).await.unwrap();
    }

    /// Next envelope of type `kind`, skipping any other
    pub async fn next_of_type(&mut self, kind: &str) -> Payload {
        tokio::time::timeout(RECV_TIMEOUT, async {
            loop {
                let payload = self
                    .inbound
                    .message()
                    .await
                    .unwrap()
                    .expect("stream ended");
                let matches = payload
                    .metadata
                    .as_ref()
                    .is_some_and(|m| m.r#type == kind);
                if matches {
                    return payload;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("no '{kind}' envelope within {RECV_TIMEOUT:?}"))
    }

    /// Wait for a snapshot push satisfying `done`
    pub async fn wait_for_snapshot<F>(&mut self, mut done: F) -> Vec<ProgramStatus>
    where
        F: FnMut(&[ProgramStatus]) -> bool,
    {
        loop {
            let payload = self.next_of_type("subscriptionProgram").await;
            let statuses = decode_statuses(&payload);
            if done(&statuses) {
                return statuses;
            }
        }
    }

    /// True if nothing arrives within `window`
    pub async fn is_silent(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.inbound.message())
            .await
            .is_err()
    }
}

pub async fn connect(addr: SocketAddr) -> Controller {
    let mut client = BiRequestStreamClient::connect(format!("http://{addr}"))
        .await
        .unwrap();
    let (tx, rx) = mpsc::channel(16);
    let inbound = client
        .request_bi_stream(ReceiverStream::new(rx))
        .await
        .unwrap()
        .into_inner();
    Controller {
        outbound: tx,
        inbound,
    }
}

pub fn command(kind: &str, name: &str, request_id: Option<&str>) -> Payload {
    let mut headers = HashMap::new();
    if let Some(id) = request_id {
        headers.insert(REQUEST_ID_HEADER.to_string(), id.to_string());
    }
    Payload {
        metadata: Some(Metadata {
            r#type: kind.to_string(),
            client_ip: "127.0.0.1".to_string(),
            headers,
        }),
        body: Some(prost_types::Any {
            type_url: JSON_TYPE_URL.to_string(),
            value: serde_json::to_vec(&serde_json::json!({ "name": name })).unwrap(),
        }),
    }
}

pub fn decode_statuses(payload: &Payload) -> Vec<ProgramStatus> {
    let body = payload.body.as_ref().unwrap();
    serde_json::from_slice(&body.value).unwrap()
}

pub fn status<'a>(statuses: &'a [ProgramStatus], name: &str) -> Option<&'a ProgramStatus> {
    statuses.iter().find(|s| s.name == name)
}
