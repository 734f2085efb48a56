//! gRPC control stream service
//! Driving adapter: one long-lived duplex stream per controller

use super::control_channel::ControlChannel;
use super::dispatcher::CommandDispatcher;
use super::mappers::payload_header;
use crate::constants::protocol::{OUTBOUND_BUFFER, REQUEST_ID_HEADER};
use crate::proto::bi_request_stream_server::BiRequestStream;
use crate::proto::Payload;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, warn};

pub type PayloadStream = Pin<Box<dyn Stream<Item = Result<Payload, Status>> + Send>>;

/// Open streams end when `closing` is cancelled, which lets a graceful
/// server shutdown complete while a controller is still connected.
#[derive(Clone)]
pub struct ControlService {
    channel: Arc<ControlChannel>,
    dispatcher: Arc<CommandDispatcher>,
    closing: CancellationToken,
}

impl ControlService {
    pub fn new(
        channel: Arc<ControlChannel>,
        dispatcher: Arc<CommandDispatcher>,
        closing: CancellationToken,
    ) -> Self {
        Self {
            channel,
            dispatcher,
            closing,
        }
    }
}

#[tonic::async_trait]
impl BiRequestStream for ControlService {
    type RequestBiStreamStream = PayloadStream;

    async fn request_bi_stream(
        &self,
        request: Request<Streaming<Payload>>,
    ) -> Result<Response<Self::RequestBiStreamStream>, Status> {
        let peer = request
            .remote_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        info!(peer = %peer, "Controller connected");

        let mut inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        self.channel.replace(tx.clone()).await;

        let channel = self.channel.clone();
        let dispatcher = self.dispatcher.clone();
        let closing = self.closing.clone();
        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = closing.cancelled() => {
                        info!(peer = %peer, "Closing control stream");
                        break;
                    }
                    received = inbound.message() => received,
                };
                match received {
                    Ok(Some(payload)) => {
                        let Some(metadata) = payload.metadata.as_ref() else {
                            warn!(peer = %peer, "Envelope without metadata, dropping");
                            continue;
                        };
                        info!(
                            peer = %peer,
                            envelope_type = %metadata.r#type,
                            client_ip = %metadata.client_ip,
                            headers = metadata.headers.len(),
                            body_size = payload.body.as_ref().map_or(0, |b| b.value.len()),
                            request_id = payload_header(&payload, REQUEST_ID_HEADER).unwrap_or("-"),
                            "Envelope received"
                        );
                        dispatcher.dispatch(&payload).await;
                    }
                    Ok(None) => {
                        info!(peer = %peer, "Controller closed the stream");
                        break;
                    }
                    Err(status) => {
                        warn!(peer = %peer, error = %status, "Control stream receive failed");
                        break;
                    }
                }
            }
            channel.release(&tx).await;
            debug!(peer = %peer, "Receive loop finished");
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}
