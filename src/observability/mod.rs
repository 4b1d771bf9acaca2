//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! tracing macros (info!, warn!, spans)
//!     → layer.rs (SinkLayer: event + span fields → LogRecord)
//!     → sink::AsyncSink (queue, worker, writer)
//!
//! logging.rs builds the process-wide sink once, installs the subscriber,
//! and returns the guard that drains it at shutdown.
//!
//! metrics.rs exposes sink and request counters (Prometheus scrape).
//! ```
//!
//! # Design Decisions
//! - Call sites keep using `tracing`; the sink is an implementation detail
//! - Span fields are grouped under the span name
//! - The filter (`RUST_LOG` or configured level) runs before the sink

pub mod layer;
pub mod logging;
pub mod metrics;

pub use layer::SinkLayer;
pub use logging::{build_sink, init, LogGuard, LoggingError};
