//! Shared definitions used by both sides of a demultiplexed connection.
//!
//! - [`error`] - Unified error type for the acceptor, engine and lifecycle.
//! - [`types`] - Tag byte enumeration and server identity.
//! - [`proto`] - Generated `testservice` messages and gRPC bindings.

pub mod error;
pub mod types;

pub use error::{Error, Result};

/// gRPC service and message definitions generated from
/// `proto/testservice.proto`.
///
/// ## Service
///
/// - `Something` - unary call answering with the serving identity.
/// - `Flow` - server-streaming call yielding exactly two responses.
///
/// ## Messages
///
/// - [`Req`](proto::Req) - request body; its content is ignored by the server.
/// - [`Resp`](proto::Resp) - `{server_name, datacenter}`.
pub mod proto {
    tonic::include_proto!("testservice");

    /// Encoded descriptor set used to register gRPC reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("testservice_descriptor");
}
