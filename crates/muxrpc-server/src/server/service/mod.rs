//! gRPC service implementations served by the engine.
//!
//! ## Structure
//!
//! - [`handler`] - `Simple` service entry point (`SimpleService`).

pub mod handler;
