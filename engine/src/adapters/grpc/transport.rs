//! TCP transport for the control service
//!
//! Serves the control stream alongside the standard health and reflection
//! services. Binding is separate from serving so a bind failure can be
//! reported before anything else starts.

use super::service::ControlService;
use crate::proto::bi_request_stream_server::BiRequestStreamServer;
use std::future::Future;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic_health::ServingStatus;
use tracing::info;

pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Bind the listen address, e.g. `127.0.0.1:9090`
pub async fn bind(address: &str) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(address).await?;
    info!(address = %listener.local_addr()?, "gRPC server bound");
    Ok(listener)
}

/// Serve until `shutdown` resolves
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    service: ControlService,
    shutdown: F,
) -> Result<(), TransportError>
where
    F: Future<Output = ()> + Send,
{
    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<BiRequestStreamServer<ControlService>>()
        .await;
    health_reporter
        .set_service_status("", ServingStatus::Serving)
        .await;

    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(crate::proto::FILE_DESCRIPTOR_SET)
        .build()?;

    info!(address = %listener.local_addr()?, "gRPC server listening");

    Server::builder()
        .add_service(health_service)
        .add_service(BiRequestStreamServer::new(service))
        .add_service(reflection_service)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;

    info!("gRPC server stopped");
    Ok(())
}
