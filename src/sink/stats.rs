//! Sink counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::observability::metrics;

/// Lock-free outcome counters shared by a sink and every handle derived from it.
#[derive(Debug, Default)]
pub struct SinkCounters {
    accepted: AtomicU64,
    dropped_full: AtomicU64,
    dropped_closed: AtomicU64,
    written: AtomicU64,
    write_failures: AtomicU64,
    flush_failures: AtomicU64,
}

impl SinkCounters {
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        metrics::record_sink_outcome("accepted");
    }

    pub fn record_dropped_full(&self) {
        self.dropped_full.fetch_add(1, Ordering::Relaxed);
        metrics::record_sink_outcome("dropped_full");
    }

    pub fn record_dropped_closed(&self) {
        self.dropped_closed.fetch_add(1, Ordering::Relaxed);
        metrics::record_sink_outcome("dropped_closed");
    }

    pub fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
        metrics::record_sink_outcome("written");
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
        metrics::record_sink_write_failure();
    }

    pub fn record_flush_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
        metrics::record_sink_flush_failure();
    }

    pub fn snapshot(&self, queued: usize, capacity: usize, closed: bool) -> SinkStats {
        SinkStats {
            capacity,
            queued,
            closed,
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped_full: self.dropped_full.load(Ordering::Relaxed),
            dropped_closed: self.dropped_closed.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SinkStats {
    pub capacity: usize,
    pub queued: usize,
    pub closed: bool,
    pub accepted: u64,
    pub dropped_full: u64,
    pub dropped_closed: u64,
    /// Records the writer accepted without error. With a buffered
    /// destination the bytes may still be lost later; see `flush_failures`.
    pub written: u64,
    pub write_failures: u64,
    /// Failed flushes. Each may have lost every record written since the
    /// previous successful flush.
    pub flush_failures: u64,
}

impl SinkStats {
    pub fn dropped(&self) -> u64 {
        self.dropped_full + self.dropped_closed
    }

    pub fn submitted(&self) -> u64 {
        self.accepted + self.dropped()
    }
}
