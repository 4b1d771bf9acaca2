//! Writers for exercising the sink from integration tests.
#![allow(dead_code)]

use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use log_sink::sink::{LogRecord, RecordWriter, Scope, WriteError};

/// Messages a [`RecordingWriter`] has received, in write order.
#[derive(Clone, Default)]
pub struct Recorded(Arc<Mutex<Vec<String>>>);

impl Recorded {
    pub fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

/// Keeps the message of every record written.
pub struct RecordingWriter {
    recorded: Recorded,
}

impl RecordingWriter {
    pub fn new() -> (Self, Recorded) {
        let recorded = Recorded::default();
        (
            Self {
                recorded: recorded.clone(),
            },
            recorded,
        )
    }
}

impl RecordWriter for RecordingWriter {
    fn write(&mut self, record: &LogRecord, _scope: &Scope) -> Result<(), WriteError> {
        self.recorded.0.lock().unwrap().push(record.message().to_string());
        Ok(())
    }
}

/// Test-controlled switch a [`GatedWriter`] blocks on.
#[derive(Clone, Default)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    pub fn open(&self) {
        let (lock, cvar) = &*self.0;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    fn wait(&self) {
        let (lock, cvar) = &*self.0;
        let mut open = lock.lock().unwrap();
        while !*open {
            open = cvar.wait(open).unwrap();
        }
    }
}

/// Records like [`RecordingWriter`], but stalls inside every write until the
/// gate opens. Each write announces its message on `entered` before stalling.
pub struct GatedWriter {
    inner: RecordingWriter,
    gate: Gate,
    entered: mpsc::Sender<String>,
}

pub struct GatedHandles {
    pub recorded: Recorded,
    pub gate: Gate,
    pub entered: mpsc::Receiver<String>,
}

impl GatedHandles {
    /// Block until the writer has started on a record.
    pub fn next_entered(&self) -> String {
        self.entered
            .recv_timeout(Duration::from_secs(5))
            .expect("writer never started a record")
    }
}

impl GatedWriter {
    pub fn new() -> (Self, GatedHandles) {
        let (inner, recorded) = RecordingWriter::new();
        let gate = Gate::default();
        let (tx, rx) = mpsc::channel();
        (
            Self {
                inner,
                gate: gate.clone(),
                entered: tx,
            },
            GatedHandles {
                recorded,
                gate,
                entered: rx,
            },
        )
    }
}

impl RecordWriter for GatedWriter {
    fn write(&mut self, record: &LogRecord, scope: &Scope) -> Result<(), WriteError> {
        let _ = self.entered.send(record.message().to_string());
        self.gate.wait();
        self.inner.write(record, scope)
    }
}

/// Fails every write.
pub struct FailingWriter;

impl RecordWriter for FailingWriter {
    fn write(&mut self, _record: &LogRecord, _scope: &Scope) -> Result<(), WriteError> {
        Err(WriteError::Io(std::io::Error::other("disk full")))
    }
}

/// `true` when `subset` appears in `full` in the same relative order.
pub fn is_subsequence(subset: &[String], full: &[String]) -> bool {
    let mut it = full.iter();
    subset.iter().all(|s| it.any(|f| f == s))
}
