//! gRPC service implementation used to exercise the demultiplexer.
//!
//! [`SimpleService`] answers the two `testservice.Simple` calls with fixed,
//! deterministic responses built from the serving [`ServerIdentity`]:
//!
//! - `Something` returns `{server_name, datacenter}` of the identity.
//! - `Flow` streams `{"one", datacenter}` then `{"two", datacenter}`.
//!
//! Request bodies are ignored.

use crate::server::streaming::flow::feed_flow;
use core::pin::Pin;
use muxrpc_core::{
    proto::{Req, Resp, simple_server::Simple},
    types::ServerIdentity,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tonic::{Request, Response, Status};
use tracing::Instrument;

/// Handler for the `testservice.Simple` gRPC service.
///
/// Cheap to clone; the identity is shared read-only between every call.
#[derive(Clone, Debug)]
pub struct SimpleService {
    identity: Arc<ServerIdentity>,
    flow_buffer_size: usize,
}

impl SimpleService {
    /// `flow_buffer_size` bounds how many `Flow` responses may wait for the
    /// client before the producer blocks. Must be greater than zero.
    pub const fn new(identity: Arc<ServerIdentity>, flow_buffer_size: usize) -> Self {
        Self {
            identity,
            flow_buffer_size,
        }
    }

    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }
}

#[tonic::async_trait]
impl Simple for SimpleService {
    type FlowStream = Pin<Box<dyn Stream<Item = Result<Resp, Status>> + Send>>;

    #[tracing::instrument(skip_all)]
    async fn something(&self, _req: Request<Req>) -> Result<Response<Resp>, Status> {
        Ok(Response::new(Resp {
            server_name: self.identity.name().to_string(),
            datacenter: self.identity.datacenter().to_string(),
        }))
    }

    /// Streams the fixed two-message sequence.
    ///
    /// The responses are produced on a spawned task feeding a bounded channel;
    /// the returned stream ends when that task finishes. If the client goes
    /// away the producer stops at the first failed send.
    #[tracing::instrument(skip_all)]
    async fn flow(&self, _req: Request<Req>) -> Result<Response<Self::FlowStream>, Status> {
        let (resp_tx, resp_rx) = mpsc::channel::<Result<Resp, Status>>(self.flow_buffer_size);
        let datacenter = self.identity.datacenter().to_string();

        let fut = async move {
            match feed_flow(&datacenter, &resp_tx).await {
                (state, Ok(())) => tracing::debug!(?state, "Flow completed"),
                (state, Err(e)) => tracing::warn!(?state, error = %e, "Flow aborted"),
            }
        };
        tokio::spawn(fut.instrument(tracing::info_span!("flow")));

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }
}
