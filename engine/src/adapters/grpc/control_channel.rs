//! The single active controller connection
//!
//! A new stream replaces the current handle; the old stream is not closed here
//! and simply stops receiving outbound envelopes. Sends never wait: without a
//! connection, or with a full buffer, the envelope is dropped.

use crate::proto::Payload;
use tokio::sync::{mpsc, Mutex};
use tonic::Status;
use tracing::{debug, info, warn};

pub type OutboundSender = mpsc::Sender<Result<Payload, Status>>;

#[derive(Debug, Default)]
pub struct ControlChannel {
    current: Mutex<Option<OutboundSender>>,
    client_ip: String,
}

impl ControlChannel {
    /// `client_ip` is stamped on every envelope the agent produces
    pub fn new(client_ip: impl Into<String>) -> Self {
        Self {
            current: Mutex::new(None),
            client_ip: client_ip.into(),
        }
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    /// Install a new connection. Returns true if one was superseded.
    pub async fn replace(&self, sender: OutboundSender) -> bool {
        let previous = self.current.lock().await.replace(sender);
        let superseded = previous.is_some_and(|p| !p.is_closed());
        if superseded {
            info!("Controller reconnected, previous stream superseded");
        }
        superseded
    }

    /// Forget `sender` if it is still the current connection
    pub async fn release(&self, sender: &OutboundSender) {
        let mut current = self.current.lock().await;
        if current.as_ref().is_some_and(|c| c.same_channel(sender)) {
            *current = None;
            debug!("Controller connection released");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.current
            .lock()
            .await
            .as_ref()
            .is_some_and(|c| !c.is_closed())
    }

    /// At-most-once delivery. Returns true if the envelope was queued.
    pub async fn send(&self, payload: Payload) -> bool {
        let current = self.current.lock().await;
        let Some(sender) = current.as_ref() else {
            debug!("No controller connected, dropping outbound envelope");
            return false;
        };
        match sender.try_send(Ok(payload)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Outbound buffer full, dropping envelope");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Controller stream closed, dropping envelope");
                false
            }
        }
    }
}
