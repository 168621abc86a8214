//! Classification and hand-off of a single accepted connection.
//!
//! The tag byte is read straight off the socket with no buffering in between,
//! so a connection handed to the engine still holds every byte the peer sent
//! after the tag.

use super::stats::DemuxStats;
use crate::server::engine::EngineHandle;
use muxrpc_core::{Error, Result, types::RpcType};
use std::io::ErrorKind;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    net::TcpStream,
};

/// How a dispatched connection left the demultiplexer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Handed to the gRPC engine.
    Forwarded,
    /// The peer closed before sending a tag byte.
    Disconnected,
    /// The tag byte could not be read.
    ReadFailed,
    /// The tag byte named no known sub-protocol.
    Rejected(u8),
    /// The tag was valid but the engine no longer takes connections.
    EngineStopped,
}

/// Reads the tag byte from `conn`.
///
/// Returns `Ok(None)` when the peer closed the connection before sending
/// anything; that is an expected end of a connection, not a failure.
///
/// # Errors
///
/// Returns [`Error::TagRead`] for any other read failure.
pub async fn read_tag<R>(conn: &mut R) -> Result<Option<RpcType>>
where
    R: AsyncRead + Unpin,
{
    match conn.read_u8().await {
        Ok(byte) => Ok(Some(RpcType::from(byte))),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(Error::TagRead(e)),
    }
}

/// Classifies `conn` by its tag byte and forwards or closes it.
///
/// Ownership of the connection ends here in every branch: it either moves into
/// the engine or is dropped, which closes it without writing anything back.
pub async fn dispatch_connection(
    mut conn: TcpStream,
    engine: &EngineHandle,
    stats: &DemuxStats,
) -> Outcome {
    let typ = match read_tag(&mut conn).await {
        Ok(Some(typ)) => typ,
        Ok(None) => {
            tracing::debug!("Peer closed before sending a tag byte");
            stats.record_early_disconnect();
            return Outcome::Disconnected;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read tag byte");
            stats.record_read_error();
            return Outcome::ReadFailed;
        }
    };

    match typ {
        RpcType::Grpc => match engine.handle(conn).await {
            Ok(()) => {
                tracing::trace!("Connection handed to gRPC engine");
                stats.record_forwarded();
                Outcome::Forwarded
            }
            Err(e) => {
                tracing::warn!(error = %e, "gRPC engine refused connection");
                Outcome::EngineStopped
            }
        },
        RpcType::Unknown(tag) => {
            tracing::warn!(error = %Error::UnexpectedTag(tag), "unexpected tag byte");
            stats.record_rejected();
            Outcome::Rejected(tag)
        }
    }
}
