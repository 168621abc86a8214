//! Tag byte demultiplexing for the shared listener.
//!
//! Every accepted connection starts with a single tag byte. The accept loop in
//! [`acceptor`] never waits on a peer: each connection is classified on its
//! own tracked task by [`connection::dispatch_connection`], which either hands
//! the stream to the gRPC engine or closes it.
//!
//! ## Structure
//!
//! - [`acceptor`] - accept loop, close signalling and task tracking.
//! - [`connection`] - tag byte read and per-connection dispatch.
//! - [`stats`] - connection counters.

pub mod acceptor;
pub mod connection;
pub mod stats;

pub use acceptor::{Acceptor, AcceptorHandle};
pub use stats::{DemuxSnapshot, DemuxStats};
