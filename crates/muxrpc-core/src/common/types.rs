//! # Tag Byte and Server Identity
//!
//! Every connection accepted on the shared listener starts with a single tag
//! byte naming the sub-protocol the peer wants to speak. Only the gRPC tag is
//! routed by this crate; every other value is carried as
//! [`RpcType::Unknown`] so it can be logged and rejected.
//!
//! [`ServerIdentity`] describes the process answering RPCs. It is built once
//! the listener is bound and is read-only afterwards.

use core::fmt;
use std::net::SocketAddr;

/// Wire value of the tag byte that selects the gRPC engine.
pub const GRPC_TAG: u8 = 0x08;

/// Sub-protocol requested by the first byte of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RpcType {
    /// The remainder of the connection is gRPC over HTTP/2.
    Grpc,
    /// Any tag this process does not serve.
    Unknown(u8),
}

impl RpcType {
    /// The byte a dialer must write before any framed payload.
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Grpc => GRPC_TAG,
            Self::Unknown(byte) => byte,
        }
    }
}

impl From<u8> for RpcType {
    fn from(byte: u8) -> Self {
        match byte {
            GRPC_TAG => Self::Grpc,
            other => Self::Unknown(other),
        }
    }
}

impl From<RpcType> for u8 {
    fn from(typ: RpcType) -> Self {
        typ.as_byte()
    }
}

impl fmt::Display for RpcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grpc => write!(f, "grpc"),
            Self::Unknown(byte) => write!(f, "unknown({byte:#04x})"),
        }
    }
}

/// Immutable description of the server answering RPCs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerIdentity {
    name: String,
    datacenter: String,
    address: SocketAddr,
}

impl ServerIdentity {
    pub fn new(name: impl Into<String>, datacenter: impl Into<String>, address: SocketAddr) -> Self {
        Self {
            name: name.into(),
            datacenter: datacenter.into(),
            address,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn datacenter(&self) -> &str {
        &self.datacenter
    }

    pub const fn address(&self) -> SocketAddr {
        self.address
    }
}
