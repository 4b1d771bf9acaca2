//! Asynchronous, backpressure-aware log sink with an HTTP host service.
//!
//! The [`sink`] module is the core: callers hand records to an [`AsyncSink`]
//! without blocking, a dedicated worker writes them in order, and overflow
//! is dropped and counted. Everything else wires it into a service:
//! `tracing` integration, request logging, config, and shutdown.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod sink;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use sink::{AsyncSink, LogRecord};
