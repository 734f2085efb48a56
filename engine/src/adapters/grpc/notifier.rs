//! Pushes runtime snapshots to the connected controller

use super::control_channel::ControlChannel;
use super::mappers::{encode_body, envelope, ProgramStatus};
use crate::constants::protocol::SUBSCRIPTION_PROGRAM;
use crate::domain::ports::ChangeNotifier;
use crate::domain::ProgramSnapshot;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

pub struct ChannelNotifier {
    channel: Arc<ControlChannel>,
}

impl ChannelNotifier {
    pub fn new(channel: Arc<ControlChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ChangeNotifier for ChannelNotifier {
    async fn notify(&self, snapshot: Vec<ProgramSnapshot>) {
        let statuses: Vec<ProgramStatus> = snapshot.iter().map(ProgramStatus::from).collect();
        let body = match encode_body(&statuses) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "Failed to encode program snapshot");
                return;
            }
        };
        let payload = envelope(
            SUBSCRIPTION_PROGRAM,
            self.channel.client_ip(),
            HashMap::new(),
            body,
        );
        if self.channel.send(payload).await {
            debug!(programs = statuses.len(), "Snapshot pushed");
        }
    }
}
