//! Accept loop of the shared listener.
//!
//! [`Acceptor::run`] owns the [`TcpListener`] for its whole life. Each
//! accepted connection is classified on a task spawned into the acceptor's
//! [`TaskTracker`]; the loop never awaits those tasks, so a silent peer cannot
//! hold up the next accept.
//!
//! Closing goes through [`AcceptorHandle::close`]: it stops the loop, and with
//! it every classification still waiting on a tag byte, and only returns once
//! the listening socket has been dropped.

use super::{
    connection::dispatch_connection,
    stats::{DemuxSnapshot, DemuxStats},
};
use crate::server::engine::EngineHandle;
use muxrpc_core::{Error, Result};
use std::{
    io::{self, ErrorKind},
    net::SocketAddr,
    sync::Arc,
};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::{
    sync::{CancellationToken, DropGuard},
    task::TaskTracker,
};
use tracing::Instrument;

/// The accept loop. Consumed by [`Acceptor::run`].
pub struct Acceptor {
    listener: TcpListener,
    engine: EngineHandle,
    stats: Arc<DemuxStats>,
    tracker: TaskTracker,
    close: CancellationToken,
    // Fires `closed` when the listener is gone, including when the acceptor
    // is dropped without ever running.
    closed: DropGuard,
}

/// Cloneable control surface of an [`Acceptor`].
#[derive(Clone, Debug)]
pub struct AcceptorHandle {
    local_addr: SocketAddr,
    stats: Arc<DemuxStats>,
    close: CancellationToken,
    closed: CancellationToken,
}

impl Acceptor {
    /// Wraps a bound listener whose gRPC connections go to `engine`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the listener's local address is unavailable.
    pub fn new(listener: TcpListener, engine: EngineHandle) -> Result<(Self, AcceptorHandle)> {
        let local_addr = listener.local_addr()?;
        let stats = Arc::new(DemuxStats::default());
        let close = CancellationToken::new();
        let closed = CancellationToken::new();

        let handle = AcceptorHandle {
            local_addr,
            stats: Arc::clone(&stats),
            close: close.clone(),
            closed: closed.clone(),
        };
        let acceptor = Self {
            listener,
            engine,
            stats,
            tracker: TaskTracker::new(),
            close,
            closed: closed.drop_guard(),
        };
        Ok((acceptor, handle))
    }

    /// Accepts connections until the listener is closed or accept fails.
    ///
    /// On exit the listener is dropped first, then every classification still
    /// waiting on a peer is cancelled and awaited.
    ///
    /// # Errors
    ///
    /// Always returns an error describing why the loop ended:
    /// [`Error::ListenerClosed`] after [`AcceptorHandle::close`], or
    /// [`Error::Accept`] on a non-recoverable accept failure.
    pub async fn run(self) -> Result<()> {
        let Self {
            listener,
            engine,
            stats,
            tracker,
            close,
            closed,
        } = self;

        drive(listener, &engine, &stats, &tracker, &close, closed).await
    }
}

/// Source of accepted connections.
trait Accept {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
}

impl Accept for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        Self::accept(self).await
    }
}

async fn drive<L: Accept>(
    listener: L,
    engine: &EngineHandle,
    stats: &Arc<DemuxStats>,
    tracker: &TaskTracker,
    close: &CancellationToken,
    closed: DropGuard,
) -> Result<()> {
    // Cancelled by `close`, or below once the loop ends for any reason.
    let dispatch = close.child_token();

    let result = loop {
        let accepted = tokio::select! {
            biased;
            () = close.cancelled() => break Err(Error::ListenerClosed),
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((conn, peer)) => {
                stats.record_accepted();
                spawn_dispatch(tracker, conn, peer, engine, stats, &dispatch);
            }
            Err(e) if is_recoverable(e.kind()) => {
                tracing::warn!(error = %e, "Transient accept error");
            }
            Err(e) => {
                tracing::error!(error = %e, "Accept failed, stopping accept loop");
                break Err(Error::Accept(e));
            }
        }
    };

    drop(listener);
    drop(closed);

    tracing::debug!(pending = tracker.len(), "Accept loop stopped");
    dispatch.cancel();
    tracker.close();
    tracker.wait().await;

    result
}

fn spawn_dispatch(
    tracker: &TaskTracker,
    conn: TcpStream,
    peer: SocketAddr,
    engine: &EngineHandle,
    stats: &Arc<DemuxStats>,
    dispatch: &CancellationToken,
) {
    let engine = engine.clone();
    let stats = Arc::clone(stats);
    let dispatch = dispatch.clone();

    let fut = async move {
        tokio::select! {
            biased;
            () = dispatch.cancelled() => {
                tracing::debug!("Accept loop stopped before the connection was dispatched");
            }
            _ = dispatch_connection(conn, &engine, &stats) => {}
        }
    };
    tracker.spawn(fut.instrument(tracing::debug_span!("conn", %peer)));
}

/// Accept errors tied to a single half-open connection rather than the
/// listener itself.
const fn is_recoverable(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset | ErrorKind::Interrupted
    )
}

impl AcceptorHandle {
    /// Closes the listener and waits until the socket has been dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ListenerClosed`] if the acceptor was already closed.
    pub async fn close(&self) -> Result<()> {
        if self.close.is_cancelled() {
            return Err(Error::ListenerClosed);
        }

        self.close.cancel();
        self.closed.cancelled().await;
        Ok(())
    }

    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> DemuxSnapshot {
        self.stats.snapshot()
    }
}
