pub mod config;
pub mod demux;
pub mod engine;
pub mod lifecycle;
pub mod service;
pub mod streaming;
pub mod telemetry;
