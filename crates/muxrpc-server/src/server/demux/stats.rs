//! Per-listener connection counters.
//!
//! The counters are plain relaxed atomics: they are read for observability and
//! tests, never used to make decisions. Each update is mirrored to the
//! OpenTelemetry meter when the `metrics` feature is enabled.

use crate::server::telemetry::{record_connection_accepted, record_connection_outcome};
use portable_atomic::{AtomicU64, Ordering};

/// Live counters shared by the accept loop and its dispatch tasks.
#[derive(Debug, Default)]
pub struct DemuxStats {
    accepted: AtomicU64,
    forwarded: AtomicU64,
    rejected: AtomicU64,
    read_errors: AtomicU64,
    early_disconnects: AtomicU64,
}

/// A point-in-time copy of [`DemuxStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DemuxSnapshot {
    /// Connections returned by `accept`.
    pub accepted: u64,
    /// Connections handed to the gRPC engine.
    pub forwarded: u64,
    /// Connections closed because of an unknown tag byte.
    pub rejected: u64,
    /// Connections closed because the tag byte could not be read.
    pub read_errors: u64,
    /// Connections closed by the peer before any byte arrived.
    pub early_disconnects: u64,
}

impl DemuxStats {
    pub fn snapshot(&self) -> DemuxSnapshot {
        DemuxSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            early_disconnects: self.early_disconnects.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        record_connection_accepted();
    }

    pub(crate) fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        record_connection_outcome("forwarded");
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        record_connection_outcome("rejected");
    }

    pub(crate) fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
        record_connection_outcome("read_error");
    }

    pub(crate) fn record_early_disconnect(&self) {
        self.early_disconnects.fetch_add(1, Ordering::Relaxed);
        record_connection_outcome("early_disconnect");
    }
}
