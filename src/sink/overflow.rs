//! "log buffer full" diagnostics.
//!
//! Producers only count drops. The worker thread turns the count into a
//! stderr line, throttled to one per interval, so a stalled stderr can block
//! the worker but never a producer. Each line carries the number of drops
//! since the previous one.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const NEVER: u64 = u64::MAX;

pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct OverflowReporter {
    epoch: Instant,
    interval_ms: u64,
    last_report_ms: AtomicU64,
    pending: AtomicU64,
}

impl OverflowReporter {
    pub fn new(interval: Duration) -> Self {
        Self {
            epoch: Instant::now(),
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            last_report_ms: AtomicU64::new(NEVER),
            pending: AtomicU64::new(0),
        }
    }

    /// Count one drop. Called from producers; never blocks.
    pub fn note_drop(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    /// Drops not yet reported.
    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }

    /// Take the pending count if a report is due at `now`.
    pub fn take_due(&self, now: Instant) -> Option<u64> {
        if self.pending.load(Ordering::Relaxed) == 0 {
            return None;
        }
        let now_ms = now.saturating_duration_since(self.epoch).as_millis() as u64;
        let last = self.last_report_ms.load(Ordering::Relaxed);
        if last != NEVER && now_ms.saturating_sub(last) < self.interval_ms {
            return None;
        }
        self.last_report_ms.store(now_ms, Ordering::Relaxed);
        Some(self.pending.swap(0, Ordering::AcqRel))
    }

    /// Take whatever is pending, ignoring the interval.
    pub fn take_all(&self) -> Option<u64> {
        match self.pending.swap(0, Ordering::AcqRel) {
            0 => None,
            dropped => Some(dropped),
        }
    }

    /// Write the report line for `dropped` records. Output errors are ignored.
    pub fn emit(dropped: u64) {
        let _ = writeln!(
            io::stderr().lock(),
            "log buffer full: dropped {} record(s)",
            dropped
        );
    }
}

impl Default for OverflowReporter {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_INTERVAL)
    }
}
