//! Response production for server-streaming calls.
//!
//! - [`flow`] - the fixed two-message `Flow` sequence and its state machine.

pub mod flow;
