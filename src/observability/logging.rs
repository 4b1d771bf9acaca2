//! Structured logging bootstrap.
//!
//! # Responsibilities
//! - Build the process-wide sink from configuration
//! - Install the global `tracing` subscriber (filter + sink layer)
//! - Drain the sink exactly once at shutdown through [`LogGuard`]
//!
//! # Design Decisions
//! - JSON for production, text for development (`logging.env`)
//! - `RUST_LOG` overrides the configured level
//! - The guard closes with a deadline; a timeout is reported on stderr

use std::fs::OpenOptions;
use std::io::{self, BufWriter};
use std::time::Duration;

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::observability::layer::SinkLayer;
use crate::sink::{resolve_capacity, AsyncSink, CloseOutcome, SinkError};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("log file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("global subscriber already installed: {0}")]
    Install(#[from] TryInitError),
}

/// Build a sink writing to stdout, or to `logging.file` when set.
pub fn build_sink(config: &LoggingConfig) -> Result<AsyncSink, LoggingError> {
    let env = config.environment();
    let writer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::File {
                    path: path.display().to_string(),
                    source,
                })?;
            // no colour codes in files
            env.writer(BufWriter::new(file), false)
        }
        None => env.writer(io::stdout(), config.color),
    };

    let sink = AsyncSink::builder()
        .capacity(resolve_capacity(config.buffer_capacity))
        .spawn(writer)?;
    Ok(sink)
}

/// Filter from `RUST_LOG`, falling back to the configured level.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, ParseError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level),
    }
}

/// Build the sink and install it as the global subscriber.
pub fn init(config: &LoggingConfig) -> Result<LogGuard, LoggingError> {
    let filter = env_filter(config)?;
    let sink = build_sink(config)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(SinkLayer::new(sink.clone()))
        .try_init()?;

    Ok(LogGuard::new(sink, config.shutdown_timeout()))
}

/// Owns the process-wide sink; closes it on [`shutdown`](Self::shutdown) or drop.
#[derive(Debug)]
pub struct LogGuard {
    sink: AsyncSink,
    timeout: Duration,
}

impl LogGuard {
    pub fn new(sink: AsyncSink, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    /// Handle for components that take the sink explicitly.
    pub fn sink(&self) -> &AsyncSink {
        &self.sink
    }

    /// Close the sink, waiting at most the configured timeout.
    pub fn shutdown(self) -> CloseOutcome {
        self.close()
    }

    fn close(&self) -> CloseOutcome {
        let outcome = self.sink.close_timeout(self.timeout);
        if outcome == CloseOutcome::TimedOut {
            let stats = self.sink.stats();
            eprintln!(
                "log sink did not drain within {:?}; {} buffered record(s) may be lost",
                self.timeout, stats.queued
            );
        }
        outcome
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_sink_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.log");
        let config = LoggingConfig {
            file: Some(path.clone()),
            buffer_capacity: 8,
            ..LoggingConfig::default()
        };

        let sink = build_sink(&config).unwrap();
        assert_eq!(sink.capacity(), 8);
        sink.submit(crate::sink::LogRecord::new(crate::sink::Level::Info, "to file"));
        let guard = LogGuard::new(sink, Duration::from_secs(5));
        assert_eq!(guard.shutdown(), CloseOutcome::Drained);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"msg\":\"to file\""));
    }

    #[test]
    fn test_build_sink_with_maximum_capacity() {
        let config = LoggingConfig {
            buffer_capacity: i64::MAX,
            ..LoggingConfig::default()
        };
        let sink = build_sink(&config).unwrap();
        assert_eq!(sink.capacity(), crate::sink::queue::MAX_CAPACITY);
        sink.close();
    }

    #[test]
    fn test_guard_drop_closes_sink() {
        let sink = build_sink(&LoggingConfig::default()).unwrap();
        let handle = sink.clone();
        drop(LogGuard::new(sink, Duration::from_secs(5)));
        assert!(handle.is_closed());
        assert!(handle.is_drained());
    }

    #[test]
    fn test_configured_level_is_used_as_filter() {
        let config = LoggingConfig {
            level: "api=notalevel".into(),
            ..LoggingConfig::default()
        };
        if std::env::var("RUST_LOG").is_err() {
            assert!(env_filter(&config).is_err());
        }
    }
}
