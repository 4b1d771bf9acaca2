//! Load generator for the log sink.
//!
//! Spawns producer threads against a sink whose writer is artificially slow,
//! then closes it and prints the resulting counters.

use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use serde_json::json;

use log_sink::sink::{
    AsyncSink, Environment, Level, LogRecord, RecordWriter, Scope, WriteError,
};

#[derive(Parser)]
#[command(name = "sink-bench")]
#[command(about = "Measure throughput and drops of the log sink", long_about = None)]
struct Cli {
    /// Queue capacity. Zero selects the default.
    #[arg(short, long, default_value_t = 0)]
    capacity: usize,

    #[arg(short, long, default_value_t = 4)]
    producers: usize,

    #[arg(short, long, default_value_t = 10_000)]
    records: u64,

    /// Sleep per written record, in microseconds.
    #[arg(short, long, default_value_t = 0)]
    write_delay_us: u64,

    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Write records to stdout instead of discarding them.
    #[arg(long)]
    stdout: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Text,
}

struct DelayedWriter {
    inner: Box<dyn RecordWriter>,
    delay: Duration,
}

impl RecordWriter for DelayedWriter {
    fn write(&mut self, record: &LogRecord, scope: &Scope) -> Result<(), WriteError> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.inner.write(record, scope)
    }

    fn flush(&mut self) -> Result<(), WriteError> {
        self.inner.flush()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let env = match cli.format {
        Format::Json => Environment::Production,
        Format::Text => Environment::Development,
    };
    let inner = if cli.stdout {
        env.writer(io::stdout(), false)
    } else {
        env.writer(io::sink(), false)
    };
    let sink = AsyncSink::builder()
        .capacity(cli.capacity)
        .thread_name("sink-bench-worker")
        .spawn(DelayedWriter {
            inner,
            delay: Duration::from_micros(cli.write_delay_us),
        })?;

    let start = Instant::now();
    let handles: Vec<_> = (0..cli.producers)
        .map(|producer| {
            let sink = sink.with_attrs([log_sink::sink::Attr::new("producer", producer)]);
            let records = cli.records;
            thread::spawn(move || {
                for seq in 0..records {
                    sink.submit(LogRecord::new(Level::Info, "bench record").with_attr("seq", seq));
                }
            })
        })
        .collect();
    for handle in handles {
        let _ = handle.join();
    }
    let submit_elapsed = start.elapsed();

    sink.close();
    let total_elapsed = start.elapsed();

    let report = json!({
        "producers": cli.producers,
        "records_per_producer": cli.records,
        "submit_ms": submit_elapsed.as_secs_f64() * 1000.0,
        "total_ms": total_elapsed.as_secs_f64() * 1000.0,
        "stats": sink.stats(),
    });
    let mut out = io::stderr().lock();
    serde_json::to_writer_pretty(&mut out, &report)?;
    writeln!(out)?;
    Ok(())
}
