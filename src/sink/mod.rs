//! Asynchronous log sink subsystem.
//!
//! # Data Flow
//! ```text
//! request handlers, background tasks (many threads)
//!     → record.rs (LogRecord built by the producer)
//!     → async_sink.rs (submit: enqueue or drop, never wait)
//!     → queue.rs (bounded FIFO, single consumer)
//!     → worker thread
//!     → writer.rs (JSON / text rendering to stdout or a file)
//! ```
//!
//! # Design Decisions
//! - Bounded memory and caller latency win over completeness: a full queue drops
//! - `with_attrs` / `with_group` produce handles with their own `Scope` but one
//!   shared lifecycle
//! - Shutdown is explicit: `close` drains everything accepted before it

pub mod async_sink;
pub mod latch;
pub mod overflow;
pub mod queue;
pub mod record;
pub mod scope;
pub mod stats;
pub mod writer;

pub use async_sink::{resolve_capacity, AsyncSink, CloseOutcome, SinkBuilder, SinkError, DEFAULT_CAPACITY};
pub use record::{error_attr, Attr, Level, LogRecord, Value};
pub use scope::Scope;
pub use stats::SinkStats;
pub use writer::{Environment, JsonWriter, RecordWriter, TextWriter, WriteError};
