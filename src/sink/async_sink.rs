//! Asynchronous, backpressure-aware sink.
//!
//! # Data Flow
//! ```text
//! producers (any thread)                       worker thread
//!     submit(record)                               loop:
//!       → read lock on state                          dequeue_blocking()
//!       → Open:   try_enqueue ──▶ [bounded queue] ──▶ writer.write(record, scope)
//!                   full → drop + count            report drops (stderr, throttled)
//!       → Closed: drop                             until finished and empty
//!                                                  flush, release drain latch
//!
//! close()
//!     → write lock, take producer (Open → Closed)
//!     → mark_no_more_producers
//!     → wait on drain latch
//! ```
//!
//! # Design Decisions
//! - Producers share a read lock, so they never serialize with each other;
//!   `close` takes the write lock, which makes check-then-enqueue atomic
//! - Derived handles share one `Shared`; only their scope differs
//! - The worker owns the writer exclusively and never sees the lock
//! - Writer errors and panics, in `write` or `flush`, are counted, never
//!   surfaced to producers
//! - Producers never touch stderr; the worker prints the overflow line

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::sink::latch::DrainLatch;
use crate::sink::overflow::{OverflowReporter, DEFAULT_REPORT_INTERVAL};
use crate::sink::queue::{QueueConsumer, QueueProducer, RecordQueue, Rejected, MAX_CAPACITY};
use crate::sink::record::{Attr, LogRecord};
use crate::sink::scope::Scope;
use crate::sink::stats::{SinkCounters, SinkStats};
use crate::sink::writer::RecordWriter;

/// Queue capacity used when none (or a non-positive one) is configured.
pub const DEFAULT_CAPACITY: usize = 10_000;

const WORKER_THREAD_NAME: &str = "log-sink-worker";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to spawn log sink worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Result of a bounded close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Every accepted record reached the writer.
    Drained,
    /// The deadline passed first; buffered records may be lost if the
    /// process exits now.
    TimedOut,
    /// Another call already closed the sink.
    AlreadyClosed,
}

/// Map a configured capacity to a usable one: non-positive selects the
/// default, anything above [`MAX_CAPACITY`] is clamped to it.
pub fn resolve_capacity(requested: i64) -> usize {
    if requested <= 0 {
        return DEFAULT_CAPACITY;
    }
    usize::try_from(requested)
        .unwrap_or(usize::MAX)
        .min(MAX_CAPACITY)
}

struct Entry {
    record: LogRecord,
    scope: Arc<Scope>,
}

/// Lifecycle state shared by a sink and all of its derived handles.
struct Shared {
    /// `None` once closed.
    producer: RwLock<Option<QueueProducer<Entry>>>,
    capacity: usize,
    counters: Arc<SinkCounters>,
    drained: Arc<DrainLatch>,
    overflow: Arc<OverflowReporter>,
}

/// Handle to an asynchronous sink.
///
/// Cloning is cheap. Handles produced by [`with_attrs`](Self::with_attrs)
/// and [`with_group`](Self::with_group) share the queue, the open/closed
/// state and the drain latch with their parent.
#[derive(Clone)]
pub struct AsyncSink {
    shared: Arc<Shared>,
    scope: Arc<Scope>,
}

/// Configures and starts an [`AsyncSink`].
#[derive(Debug, Clone)]
pub struct SinkBuilder {
    capacity: usize,
    thread_name: String,
    overflow_interval: Duration,
}

impl Default for SinkBuilder {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            thread_name: WORKER_THREAD_NAME.to_string(),
            overflow_interval: DEFAULT_REPORT_INTERVAL,
        }
    }
}

impl SinkBuilder {
    /// Maximum number of buffered records. Zero selects the default; values
    /// above [`MAX_CAPACITY`] are clamped.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = match capacity {
            0 => DEFAULT_CAPACITY,
            n => n.min(MAX_CAPACITY),
        };
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Minimum gap between two "log buffer full" lines on stderr.
    pub fn overflow_report_interval(mut self, interval: Duration) -> Self {
        self.overflow_interval = interval;
        self
    }

    /// Start the worker thread and return the root handle.
    pub fn spawn<W>(self, writer: W) -> Result<AsyncSink, SinkError>
    where
        W: RecordWriter + 'static,
    {
        let (producer, consumer) = RecordQueue::bounded(self.capacity);
        let counters = Arc::new(SinkCounters::default());
        let drained = Arc::new(DrainLatch::new());
        let overflow = Arc::new(OverflowReporter::new(self.overflow_interval));

        let worker = Worker {
            consumer,
            writer: Box::new(writer),
            counters: counters.clone(),
            drained: drained.clone(),
            overflow: overflow.clone(),
            failure_reported: false,
        };
        thread::Builder::new()
            .name(self.thread_name)
            .spawn(move || worker.run())
            .map_err(SinkError::Spawn)?;

        let capacity = producer.capacity();
        Ok(AsyncSink {
            shared: Arc::new(Shared {
                producer: RwLock::new(Some(producer)),
                capacity,
                counters,
                drained,
                overflow,
            }),
            scope: Arc::new(Scope::root()),
        })
    }
}

impl AsyncSink {
    pub fn builder() -> SinkBuilder {
        SinkBuilder::default()
    }

    /// Start a sink with default settings.
    pub fn spawn<W>(writer: W) -> Result<Self, SinkError>
    where
        W: RecordWriter + 'static,
    {
        SinkBuilder::default().spawn(writer)
    }

    /// Hand a record to the sink without waiting.
    ///
    /// The record is dropped when the sink is closed or the queue is full.
    pub fn submit(&self, record: LogRecord) {
        let state = self
            .shared
            .producer
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(producer) = state.as_ref() else {
            self.shared.counters.record_dropped_closed();
            return;
        };
        let entry = Entry {
            record,
            scope: Arc::clone(&self.scope),
        };
        match producer.try_enqueue(entry) {
            Ok(()) => self.shared.counters.record_accepted(),
            Err(Rejected::Full(_)) => {
                self.shared.counters.record_dropped_full();
                // reported by the worker, never from here
                self.shared.overflow.note_drop();
            }
            Err(Rejected::Closed(_)) => self.shared.counters.record_dropped_closed(),
        }
    }

    /// Close the sink and block until every accepted record is written.
    ///
    /// Applies to this handle, its parent and every derived handle. Calls
    /// after the first return immediately.
    pub fn close(&self) {
        if self.begin_close() {
            self.shared.drained.wait();
        }
    }

    /// Like [`close`](Self::close) but waits at most `timeout` for the drain.
    ///
    /// On timeout the worker keeps draining in the background.
    pub fn close_timeout(&self, timeout: Duration) -> CloseOutcome {
        if !self.begin_close() {
            return CloseOutcome::AlreadyClosed;
        }
        if self.shared.drained.wait_timeout(timeout) {
            CloseOutcome::Drained
        } else {
            CloseOutcome::TimedOut
        }
    }

    /// Switch to closed. Returns false if the sink was already closed.
    fn begin_close(&self) -> bool {
        let producer = self
            .shared
            .producer
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match producer {
            Some(producer) => {
                producer.mark_no_more_producers();
                true
            }
            None => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared
            .producer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// True once the worker has drained the queue and exited.
    pub fn is_drained(&self) -> bool {
        self.shared.drained.is_released()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn stats(&self) -> SinkStats {
        let queued = self
            .shared
            .producer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(QueueProducer::len);
        let closed = queued.is_none();
        let mut stats = self.shared.counters.snapshot(0, self.shared.capacity, closed);
        stats.queued = queued.unwrap_or_else(|| {
            stats
                .accepted
                .saturating_sub(stats.written + stats.write_failures) as usize
        });
        stats
    }

    /// Decoration of this handle.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// A handle whose records carry `attrs` in addition to this handle's.
    pub fn with_attrs(&self, attrs: impl IntoIterator<Item = Attr>) -> AsyncSink {
        let attrs: Vec<Attr> = attrs.into_iter().collect();
        if attrs.is_empty() {
            return self.clone();
        }
        AsyncSink {
            shared: Arc::clone(&self.shared),
            scope: Arc::new(self.scope.with_attrs(attrs)),
        }
    }

    /// A handle whose later attributes are qualified by `name`.
    pub fn with_group(&self, name: &str) -> AsyncSink {
        if name.is_empty() {
            return self.clone();
        }
        AsyncSink {
            shared: Arc::clone(&self.shared),
            scope: Arc::new(self.scope.with_group(name)),
        }
    }

    /// True when both handles belong to the same sink.
    pub fn same_sink(&self, other: &AsyncSink) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for AsyncSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncSink")
            .field("capacity", &self.shared.capacity)
            .field("closed", &self.is_closed())
            .field("scope", &self.scope)
            .finish()
    }
}

/// Releases the drain latch when the worker exits, including by unwinding.
struct ReleaseOnExit(Arc<DrainLatch>);

impl Drop for ReleaseOnExit {
    fn drop(&mut self) {
        self.0.release();
    }
}

struct Worker {
    consumer: QueueConsumer<Entry>,
    writer: Box<dyn RecordWriter>,
    counters: Arc<SinkCounters>,
    drained: Arc<DrainLatch>,
    overflow: Arc<OverflowReporter>,
    failure_reported: bool,
}

impl Worker {
    fn run(mut self) {
        let _release = ReleaseOnExit(self.drained.clone());

        loop {
            let entry = match self.consumer.try_dequeue() {
                Some(entry) => entry,
                None => {
                    // queue ran dry: push what we have before sleeping
                    self.flush();
                    self.report_overflow();
                    match self.consumer.dequeue_blocking() {
                        Some(entry) => entry,
                        None => break,
                    }
                }
            };
            self.write(&entry);
            self.report_overflow();
        }

        self.flush();
        if let Some(dropped) = self.overflow.take_all() {
            OverflowReporter::emit(dropped);
        }
    }

    fn write(&mut self, entry: &Entry) {
        let writer = &mut self.writer;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            writer.write(&entry.record, &entry.scope)
        }));
        match result {
            Ok(Ok(())) => self.counters.record_written(),
            Ok(Err(e)) => {
                self.counters.record_write_failure();
                self.failed(&e.to_string());
            }
            Err(_) => {
                self.counters.record_write_failure();
                self.failed("writer panicked");
            }
        }
    }

    fn flush(&mut self) {
        let writer = &mut self.writer;
        let result = panic::catch_unwind(AssertUnwindSafe(|| writer.flush()));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.counters.record_flush_failure();
                self.failed(&format!("flush failed: {}", e));
            }
            Err(_) => {
                self.counters.record_flush_failure();
                self.failed("writer panicked during flush");
            }
        }
    }

    fn report_overflow(&self) {
        if let Some(dropped) = self.overflow.take_due(Instant::now()) {
            OverflowReporter::emit(dropped);
        }
    }

    fn failed(&mut self, reason: &str) {
        if !self.failure_reported {
            self.failure_reported = true;
            eprintln!(
                "log sink: {}; further write failures are only counted",
                reason
            );
        }
    }
}
