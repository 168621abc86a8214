//! gRPC engine fed by the demultiplexer.
//!
//! [`RpcEngine`] owns the tonic router (the `Simple` service plus health and
//! reflection) and serves whatever connections arrive on its hand-off queue.
//! It never touches a listening socket: the demultiplexer accepts, strips the
//! tag byte and pushes the rest of the stream in through
//! [`EngineHandle::handle`].
//!
//! Shutdown is graceful. Once [`EngineHandle::shutdown`] fires, health flips to
//! `NOT_SERVING`, no queued connection is taken any more, and [`RpcEngine::run`]
//! returns after every connection already being served has closed.

use crate::server::service::handler::SimpleService;
use muxrpc_core::{
    Error, Result,
    proto::{FILE_DESCRIPTOR_SET, simple_server::SimpleServer},
};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tonic_health::server::HealthReporter;
use tonic_reflection::server::Builder;

/// The serving half of the engine. Consumed by [`RpcEngine::run`].
pub struct RpcEngine {
    service: SimpleService,
    incoming: mpsc::Receiver<TcpStream>,
    shutdown: CancellationToken,
}

/// Cloneable control surface of a running [`RpcEngine`].
#[derive(Clone, Debug)]
pub struct EngineHandle {
    conn_tx: mpsc::Sender<TcpStream>,
    shutdown: CancellationToken,
}

impl RpcEngine {
    /// Creates an engine for `service` with a hand-off queue holding up to
    /// `handoff_buffer_size` connections.
    pub fn new(service: SimpleService, handoff_buffer_size: usize) -> (Self, EngineHandle) {
        let (conn_tx, incoming) = mpsc::channel(handoff_buffer_size);
        let shutdown = CancellationToken::new();

        let engine = Self {
            service,
            incoming,
            shutdown: shutdown.clone(),
        };
        (engine, EngineHandle { conn_tx, shutdown })
    }

    /// Serves handed-off connections until [`EngineHandle::shutdown`] is
    /// called and every open connection has drained.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if the reflection service cannot be built and
    /// [`Error::Transport`] if tonic fails while serving.
    pub async fn run(self) -> Result<()> {
        let (health_reporter, health_service) = tonic_health::server::health_reporter();
        health_reporter
            .set_serving::<SimpleServer<SimpleService>>()
            .await;

        let reflection = Builder::configure()
            .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
            .build_v1()
            .map_err(|e| Error::Engine {
                context: format!("failed to build reflection service: {e}"),
            })?;

        let incoming = ReceiverStream::new(self.incoming).map(Ok::<_, std::io::Error>);

        tracing::info!("gRPC engine serving");

        Server::builder()
            .http2_adaptive_window(Some(true))
            .add_service(health_service)
            .add_service(reflection)
            .add_service(SimpleServer::new(self.service))
            .serve_with_incoming_shutdown(incoming, shutdown_signal(self.shutdown, health_reporter))
            .await?;

        tracing::info!("gRPC engine stopped");
        Ok(())
    }
}

impl EngineHandle {
    /// Hands a connection, positioned after its tag byte, to the engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] if the engine is shutting down or
    /// has stopped. The connection is dropped, and therefore closed, in that
    /// case.
    pub async fn handle(&self, conn: TcpStream) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        self.conn_tx
            .send(conn)
            .await
            .map_err(|_| Error::ServiceShutdown)
    }

    /// Signals the engine to stop serving.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] if shutdown was already requested.
    pub fn shutdown(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        self.shutdown.cancel();
        Ok(())
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// A handle with no engine behind it; the receiver sees every hand-off.
    #[cfg(test)]
    pub(crate) fn detached(handoff_buffer_size: usize) -> (Self, mpsc::Receiver<TcpStream>) {
        let (conn_tx, incoming) = mpsc::channel(handoff_buffer_size);
        let handle = Self {
            conn_tx,
            shutdown: CancellationToken::new(),
        };
        (handle, incoming)
    }
}

async fn shutdown_signal(shutdown: CancellationToken, health_reporter: HealthReporter) {
    shutdown.cancelled().await;

    tracing::info!("gRPC engine shutting down");
    health_reporter
        .set_not_serving::<SimpleServer<SimpleService>>()
        .await;
}
