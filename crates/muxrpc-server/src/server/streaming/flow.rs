use crate::server::telemetry::record_flow_outcome;
use muxrpc_core::{Error, proto::Resp};
use tokio::sync::mpsc;
use tonic::Status;

/// Server names sent by a `Flow` call, in order.
pub const FLOW_SERVER_NAMES: [&str; 2] = ["one", "two"];

/// Progress of a single `Flow` call.
///
/// `NotStarted -> SentOne -> Done` on successful sends; a failed send moves
/// straight to `Aborted` from wherever the stream was.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowState {
    NotStarted,
    SentOne,
    Done,
    Aborted,
}

impl FlowState {
    /// Next state after one send attempt.
    const fn next(self, sent: bool) -> Self {
        match (self, sent) {
            (Self::Aborted, _) | (_, false) => Self::Aborted,
            (Self::NotStarted, true) => Self::SentOne,
            (Self::SentOne | Self::Done, true) => Self::Done,
        }
    }
}

/// Sends the fixed `Flow` sequence for `datacenter` into `sink`.
///
/// Returns the final state together with the outcome. The stream ends when
/// `sink` is dropped after this returns; no explicit completion message is
/// sent.
///
/// On success the state is [`FlowState::Done`]. As soon as a send fails,
/// typically because the client went away, the state is
/// [`FlowState::Aborted`], the result is [`Error::ChannelError`], and later
/// messages are not attempted.
pub async fn feed_flow(
    datacenter: &str,
    sink: &mpsc::Sender<Result<Resp, Status>>,
) -> (FlowState, Result<(), Error>) {
    let mut state = FlowState::NotStarted;

    for server_name in FLOW_SERVER_NAMES {
        let resp = Resp {
            server_name: server_name.to_string(),
            datacenter: datacenter.to_string(),
        };

        let sent = sink.send(Ok(resp)).await;
        let from = state;
        state = state.next(sent.is_ok());

        if let Err(e) = sent {
            tracing::debug!(?from, to = ?state, "Flow aborted");
            record_flow_outcome("aborted");
            let err = Error::ChannelError {
                context: format!("Failed to send {server_name:?} after {from:?}: {e}"),
            };
            return (state, Err(err));
        }

        tracing::trace!(?state, "Flow advanced");
    }

    record_flow_outcome("completed");
    (state, Ok(()))
}
