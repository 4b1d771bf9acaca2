//! Synchronous record writers.
//!
//! # Responsibilities
//! - Render a record plus its handle's scope into bytes
//! - Push the bytes to an `io::Write` destination
//!
//! # Design Decisions
//! - Writers are owned by the sink's single consumer thread, so `&mut self`
//! - JSON lines for production, a compact human format for development
//! - Writers never flush per record; the consumer flushes when the queue runs dry

use std::io::{self, Write};

use chrono::SecondsFormat;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::sink::record::{Level, LogRecord};
use crate::sink::scope::Scope;

/// Error raised by a writer. The sink counts these and moves on.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("write failed: {0}")]
    Io(#[from] io::Error),

    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The collaborator a sink forwards records to.
pub trait RecordWriter: Send {
    /// Render and write one record.
    fn write(&mut self, record: &LogRecord, scope: &Scope) -> Result<(), WriteError>;

    /// Push buffered output to its destination.
    fn flush(&mut self) -> Result<(), WriteError> {
        Ok(())
    }
}

impl<T: RecordWriter + ?Sized> RecordWriter for Box<T> {
    fn write(&mut self, record: &LogRecord, scope: &Scope) -> Result<(), WriteError> {
        (**self).write(record, scope)
    }

    fn flush(&mut self) -> Result<(), WriteError> {
        (**self).flush()
    }
}

/// Deployment flavour that picks the output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Unknown names fall back to production.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Environment::Development,
            _ => Environment::Production,
        }
    }

    /// Writer for this environment over `out`.
    pub fn writer<W>(self, out: W, color: bool) -> Box<dyn RecordWriter>
    where
        W: Write + Send + 'static,
    {
        match self {
            Environment::Development => Box::new(TextWriter::new(out).with_color(color)),
            Environment::Production => Box::new(JsonWriter::new(out)),
        }
    }
}

/// Prefix for top-level attributes named like a header field.
const CLASH_PREFIX: &str = "fields.";

/// One JSON object per line.
///
/// ```text
/// {"time":"2024-05-01T10:00:00.000Z","level":"INFO","target":"api","msg":"request completed","status":200}
/// ```
///
/// The header fields always win: a top-level attribute called `time`,
/// `level`, `target` or `msg` is written as `fields.time` and so on.
pub struct JsonWriter<W> {
    out: W,
}

impl<W: Write + Send> JsonWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> RecordWriter for JsonWriter<W> {
    fn write(&mut self, record: &LogRecord, scope: &Scope) -> Result<(), WriteError> {
        let mut map = Map::new();
        map.insert(
            "time".into(),
            JsonValue::String(record.time().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        map.insert("level".into(), JsonValue::String(record.level().as_str().into()));
        if !record.target().is_empty() {
            map.insert("target".into(), JsonValue::String(record.target().into()));
        }
        map.insert("msg".into(), JsonValue::String(record.message().into()));

        let mut attrs = Map::new();
        scope.nest_into(record, &mut attrs);
        for (key, value) in attrs {
            if map.contains_key(&key) {
                map.insert(format!("{}{}", CLASH_PREFIX, key), value);
            } else {
                map.insert(key, value);
            }
        }

        serde_json::to_writer(&mut self.out, &map)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), WriteError> {
        self.out.flush()?;
        Ok(())
    }
}

const RESET: &str = "\x1b[0m";

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Trace => "\x1b[90m",
        Level::Debug => "\x1b[35m",
        Level::Info => "\x1b[34m",
        Level::Warn => "\x1b[33m",
        Level::Error => "\x1b[31m",
    }
}

/// Human-readable lines for local development.
///
/// ```text
/// [10:00:00.000] INFO: request completed method=GET status=200
/// ```
pub struct TextWriter<W> {
    out: W,
    color: bool,
}

impl<W: Write + Send> TextWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, color: false }
    }

    /// Wrap the level in ANSI colour codes.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> RecordWriter for TextWriter<W> {
    fn write(&mut self, record: &LogRecord, scope: &Scope) -> Result<(), WriteError> {
        let time = record.time().format("%H:%M:%S%.3f");
        let level = record.level();
        if self.color {
            write!(self.out, "[{}] {}{}{}: ", time, level_color(level), level, RESET)?;
        } else {
            write!(self.out, "[{}] {}: ", time, level)?;
        }
        self.out.write_all(record.message().as_bytes())?;

        for (key, value) in scope.flatten(record) {
            write!(self.out, " {}={}", key, quote(&value.to_string()))?;
        }
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), WriteError> {
        self.out.flush()?;
        Ok(())
    }
}

fn quote(raw: &str) -> String {
    if raw.is_empty() || raw.contains(|c: char| c.is_whitespace() || c == '"' || c == '=') {
        format!("{:?}", raw)
    } else {
        raw.to_owned()
    }
}
