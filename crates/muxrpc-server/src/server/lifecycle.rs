//! Start-up and coordinated shutdown of the whole server.
//!
//! [`Server::start`] wires the pieces together and spawns the two long-lived
//! tasks: the accept loop and the gRPC engine. [`RunningServer::stop`] tears
//! them down in a fixed order:
//!
//! 1. close the listener (no new connections, pending classifications end)
//! 2. shut the engine down (health goes `NOT_SERVING`, open calls drain)
//! 3. join both tasks
//!
//! A failing step is logged and recorded, and the remaining steps still run.

use crate::server::{
    config::ServerConfig,
    demux::{Acceptor, AcceptorHandle, DemuxSnapshot},
    engine::{EngineHandle, RpcEngine},
    service::handler::SimpleService,
};
use muxrpc_core::{Error, Result, types::ServerIdentity};
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, task::JoinSet};
use tracing::Instrument;

/// A configured server that has not bound its listener yet.
#[derive(Debug, Clone)]
pub struct Server {
    config: ServerConfig,
}

/// A server whose listener and engine are live.
///
/// Dropping it without calling [`RunningServer::stop`] aborts both tasks.
#[derive(Debug)]
pub struct RunningServer {
    identity: Arc<ServerIdentity>,
    acceptor: AcceptorHandle,
    engine: EngineHandle,
    tasks: JoinSet<Result<()>>,
}

impl Server {
    pub const fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Binds the shared listener and spawns the accept loop and the engine.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the listener cannot be bound.
    pub async fn start(self) -> Result<RunningServer> {
        let config = self.config;
        let listener = TcpListener::bind(config.server_addr).await?;
        let local_addr = listener.local_addr()?;

        let identity = Arc::new(ServerIdentity::new(
            config.server_name,
            config.datacenter,
            local_addr,
        ));
        let service = SimpleService::new(Arc::clone(&identity), config.flow_buffer_size);
        let (engine, engine_handle) = RpcEngine::new(service, config.handoff_buffer_size);
        let (acceptor, acceptor_handle) = Acceptor::new(listener, engine_handle.clone())?;

        let mut tasks = JoinSet::new();
        tasks.spawn(engine.run().instrument(tracing::info_span!("engine")));
        tasks.spawn(acceptor.run().instrument(tracing::info_span!("acceptor", %local_addr)));

        tracing::info!(
            %local_addr,
            name = identity.name(),
            datacenter = identity.datacenter(),
            "Server started"
        );

        Ok(RunningServer {
            identity,
            acceptor: acceptor_handle,
            engine: engine_handle,
            tasks,
        })
    }
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.identity.address()
    }

    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    /// Current demultiplexer counters.
    pub fn stats(&self) -> DemuxSnapshot {
        self.acceptor.stats()
    }

    /// Stops the server and waits for both tasks to finish.
    ///
    /// The accept loop ending with [`Error::ListenerClosed`] is the expected
    /// outcome of the close step and is not reported.
    ///
    /// # Errors
    ///
    /// Returns every error observed across the shutdown steps and task
    /// results, in the order they occurred.
    pub async fn stop(self) -> core::result::Result<(), Vec<Error>> {
        let Self {
            acceptor,
            engine,
            tasks,
            ..
        } = self;
        let mut errors = Vec::new();

        tracing::info!("Stopping server");

        // === Phase 1: Stop accepting, end pending classifications ===
        if let Err(e) = acceptor.close().await {
            tracing::error!(error = %e, "Failed to close listener");
            errors.push(e);
        }

        // === Phase 2: Drain the gRPC engine ===
        if let Err(e) = engine.shutdown() {
            tracing::error!(error = %e, "Failed to shut down gRPC engine");
            errors.push(e);
        }

        // === Phase 3: Join ===
        for result in join_all(tasks).await {
            match result {
                Ok(()) => {}
                Err(e) if e.is_listener_closed() => {}
                Err(e) => {
                    tracing::error!(error = %e, "Server task failed");
                    errors.push(e);
                }
            }
        }

        if errors.is_empty() {
            tracing::info!("Server stopped");
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Waits for every task in `tasks` and returns their results in completion
/// order.
///
/// A task that panicked or was cancelled yields [`Error::TaskJoin`].
pub async fn join_all(mut tasks: JoinSet<Result<()>>) -> Vec<Result<()>> {
    let mut results = Vec::with_capacity(tasks.len());

    while let Some(joined) = tasks.join_next().await {
        results.push(joined.unwrap_or_else(|e| {
            Err(Error::TaskJoin {
                reason: e.to_string(),
            })
        }));
    }

    results
}
