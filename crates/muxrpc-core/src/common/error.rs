//! Error types for the connection demultiplexer and its RPC engine.
//!
//! This module defines the central `Error` enum shared by the accept loop, the
//! per-connection dispatch tasks, the engine wrapper and the lifecycle
//! coordinator. It implements `From<Error>` for `tonic::Status` so streaming
//! handlers can surface failures to gRPC clients.
//!
//! ## Error Cases
//! - `ListenerClosed`: The listening socket was closed on purpose.
//! - `Accept`: Accepting a connection failed; fatal to the accept loop.
//! - `TagRead`: Reading the tag byte failed for a reason other than EOF.
//! - `UnexpectedTag`: The peer sent a tag byte nobody handles.
//! - `ServiceShutdown`: The engine no longer takes connections or calls.
//! - `ChannelError`: An internal channel (stream sink, hand-off) is closed.
//! - `Transport`: tonic failed to serve or to dial.
//! - `Engine`: The engine could not be assembled.
//! - `Io`: Binding or dialing a socket failed.
//! - `TaskJoin`: A tracked task panicked or was aborted.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the demultiplexer, engine and lifecycle.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The listener was closed deliberately; the accept loop has stopped.
    #[error("Listener closed")]
    ListenerClosed,

    /// Accepting a new connection failed.
    #[error("Accept error: {0}")]
    Accept(#[source] std::io::Error),

    /// The tag byte could not be read for a reason other than a clean EOF.
    #[error("Tag byte read error: {0}")]
    TagRead(#[source] std::io::Error),

    /// The first byte on the connection names no known sub-protocol.
    #[error("Unexpected tag byte: {0:#04x}")]
    UnexpectedTag(u8),

    /// The engine is shutting down or has already stopped.
    #[error("Service is shutting down")]
    ServiceShutdown,

    /// Internal channel send/receive failure (e.g., closed stream sink).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// tonic failed while serving or connecting.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The engine could not be built.
    #[error("Engine error: {context}")]
    Engine { context: String },

    /// Socket level I/O failure outside of the accept loop.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A tracked task did not run to completion.
    #[error("Task join error: {reason}")]
    TaskJoin { reason: String },
}

impl Error {
    /// Whether this error is the expected outcome of closing the listener.
    pub const fn is_listener_closed(&self) -> bool {
        matches!(self, Self::ListenerClosed)
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {}", context))
            }
            Error::UnexpectedTag(tag) => {
                Status::invalid_argument(format!("Unexpected tag byte: {tag:#04x}"))
            }
            other => Status::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn shutdown_maps_to_unavailable() {
        let status = Status::from(Error::ServiceShutdown);
        assert_eq!(status.code(), Code::Unavailable);
    }

    #[test]
    fn channel_error_keeps_context() {
        let status = Status::from(Error::ChannelError {
            context: "sink closed".to_string(),
        });
        assert_eq!(status.code(), Code::Internal);
        assert!(status.message().contains("sink closed"));
    }

    #[test]
    fn unexpected_tag_is_rendered_in_hex() {
        assert_eq!(
            Error::UnexpectedTag(0xff).to_string(),
            "Unexpected tag byte: 0xff"
        );
    }

    #[test]
    fn only_listener_closed_is_expected() {
        assert!(Error::ListenerClosed.is_listener_closed());
        assert!(!Error::ServiceShutdown.is_listener_closed());
    }
}
