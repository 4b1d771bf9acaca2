//! Ordering, loss and shutdown behaviour of the sink under real threads.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log_sink::sink::{AsyncSink, CloseOutcome, Level, LogRecord};
use proptest::prelude::*;

mod common;
use common::{is_subsequence, FailingWriter, GatedWriter, RecordingWriter};

fn record(msg: impl Into<String>) -> LogRecord {
    LogRecord::new(Level::Info, msg)
}

#[test]
fn test_fifo_order_single_producer() {
    let (writer, recorded) = RecordingWriter::new();
    let sink = AsyncSink::builder().capacity(128).spawn(writer).unwrap();

    let sent: Vec<String> = (0..128).map(|i| format!("r{}", i)).collect();
    for msg in &sent {
        sink.submit(record(msg.as_str()));
    }
    sink.close();

    assert_eq!(recorded.messages(), sent);
    let stats = sink.stats();
    assert_eq!(stats.accepted, 128);
    assert_eq!(stats.written, 128);
    assert_eq!(stats.dropped(), 0);
    assert_eq!(stats.queued, 0);
}

#[test]
fn test_bounded_loss_with_slow_writer() {
    const CAPACITY: usize = 4;
    let (writer, handles) = GatedWriter::new();
    let sink = AsyncSink::builder().capacity(CAPACITY).spawn(writer).unwrap();

    // park the worker inside the first write so the queue can only fill
    sink.submit(record("r0"));
    assert_eq!(handles.next_entered(), "r0");

    let sent: Vec<String> = (0..=10).map(|i| format!("r{}", i)).collect();
    for msg in &sent[1..] {
        sink.submit(record(msg.as_str()));
    }
    let stats = sink.stats();
    assert_eq!(stats.queued, CAPACITY);
    assert_eq!(stats.dropped_full, 10 - CAPACITY as u64);

    handles.gate.open();
    sink.close();

    let delivered = handles.recorded.messages();
    assert!(delivered.len() > CAPACITY);
    let unique: HashSet<_> = delivered.iter().collect();
    assert_eq!(unique.len(), delivered.len());
    assert!(is_subsequence(&delivered, &sent));
    assert_eq!(delivered.len() as u64 + sink.stats().dropped(), sent.len() as u64);
}

#[test]
fn test_stalled_writer_capacity_two() {
    let (writer, handles) = GatedWriter::new();
    let sink = AsyncSink::builder().capacity(2).spawn(writer).unwrap();

    sink.submit(record("A"));
    assert_eq!(handles.next_entered(), "A");
    for msg in ["B", "C", "D"] {
        sink.submit(record(msg));
    }

    handles.gate.open();
    sink.close();

    let delivered = handles.recorded.messages();
    let all: Vec<String> = ["A", "B", "C", "D"].map(String::from).to_vec();
    assert!(is_subsequence(&delivered, &all));
    let stats = sink.stats();
    assert!(stats.dropped() <= (4 - 2));
    assert_eq!(delivered, vec!["A", "B", "C"]);
    assert_eq!(stats.dropped_full, 1);
}

#[test]
fn test_capacity_two_keeping_pace() {
    let (writer, recorded) = RecordingWriter::new();
    let sink = AsyncSink::builder().capacity(2).spawn(writer).unwrap();

    for msg in ["A", "B", "C", "D"] {
        sink.submit(record(msg));
    }
    sink.close();

    let delivered = recorded.messages();
    let all: Vec<String> = ["A", "B", "C", "D"].map(String::from).to_vec();
    assert!(is_subsequence(&delivered, &all));
    assert!(sink.stats().dropped() <= 2);
    assert_eq!(delivered.len() as u64 + sink.stats().dropped(), 4);
}

#[test]
fn test_close_drains_everything_accepted() {
    let (writer, handles) = GatedWriter::new();
    let sink = AsyncSink::builder().capacity(16).spawn(writer).unwrap();

    let sent: Vec<String> = (0..16).map(|i| format!("r{}", i)).collect();
    for msg in &sent {
        sink.submit(record(msg.as_str()));
    }

    let closer = {
        let sink = sink.clone();
        thread::spawn(move || sink.close())
    };
    // close must still be waiting on the stalled writer
    thread::sleep(Duration::from_millis(50));
    assert!(!closer.is_finished());
    assert!(sink.is_closed());

    handles.gate.open();
    closer.join().unwrap();

    assert!(sink.is_drained());
    assert_eq!(handles.recorded.messages(), sent);
}

#[test]
fn test_concurrent_submit_and_close() {
    let (writer, recorded) = RecordingWriter::new();
    let sink = AsyncSink::builder().capacity(64).spawn(writer).unwrap();
    let stop = Arc::new(AtomicBool::new(false));

    let producers: Vec<_> = (0..8u32)
        .map(|p| {
            let sink = sink.with_attrs([log_sink::sink::Attr::new("producer", p)]);
            let stop = stop.clone();
            thread::spawn(move || {
                let mut n = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    sink.submit(record(format!("p{}-{}", p, n)));
                    n += 1;
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    let start = Instant::now();
    assert_eq!(sink.close_timeout(Duration::from_secs(5)), CloseOutcome::Drained);
    assert!(start.elapsed() < Duration::from_secs(5));

    thread::sleep(Duration::from_millis(5));
    stop.store(true, Ordering::Relaxed);
    for producer in producers {
        producer.join().unwrap();
    }

    let stats = sink.stats();
    assert_eq!(stats.accepted, stats.written);
    assert_eq!(recorded.len() as u64, stats.written);
    assert!(stats.dropped_closed > 0);
    assert_eq!(stats.queued, 0);

    // per-producer order survives interleaving
    let messages = recorded.messages();
    for p in 0..8 {
        let prefix = format!("p{}-", p);
        let seqs: Vec<u64> = messages
            .iter()
            .filter_map(|m| m.strip_prefix(&prefix))
            .map(|n| n.parse().unwrap())
            .collect();
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn test_second_close_returns_immediately() {
    let (writer, recorded) = RecordingWriter::new();
    let sink = AsyncSink::spawn(writer).unwrap();
    sink.submit(record("only"));

    sink.close();
    let start = Instant::now();
    sink.close();
    assert_eq!(sink.close_timeout(Duration::from_secs(1)), CloseOutcome::AlreadyClosed);
    assert!(start.elapsed() < Duration::from_millis(100));

    assert_eq!(recorded.messages(), vec!["only"]);
}

#[test]
fn test_submit_after_close_is_silent() {
    let (writer, recorded) = RecordingWriter::new();
    let sink = AsyncSink::spawn(writer).unwrap();
    let derived = sink.with_group("late");
    sink.submit(record("before"));
    sink.close();

    sink.submit(record("after"));
    derived.submit(record("after, derived"));
    thread::sleep(Duration::from_millis(20));

    assert_eq!(recorded.messages(), vec!["before"]);
    let stats = sink.stats();
    assert_eq!(stats.dropped_closed, 2);
    assert!(stats.closed);
}

#[test]
fn test_close_timeout_with_stuck_writer() {
    let (writer, handles) = GatedWriter::new();
    let sink = AsyncSink::builder().capacity(4).spawn(writer).unwrap();
    sink.submit(record("stuck"));
    sink.submit(record("queued"));

    assert_eq!(
        sink.close_timeout(Duration::from_millis(50)),
        CloseOutcome::TimedOut
    );
    assert!(!sink.is_drained());
    assert!(sink.stats().queued >= 1);

    // the worker finishes once the writer recovers
    handles.gate.open();
    let deadline = Instant::now() + Duration::from_secs(5);
    while !sink.is_drained() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(sink.is_drained());
    assert_eq!(handles.recorded.messages(), vec!["stuck", "queued"]);
}

#[test]
fn test_writer_errors_do_not_stop_the_worker() {
    let sink = AsyncSink::spawn(FailingWriter).unwrap();
    for i in 0..10 {
        sink.submit(record(format!("r{}", i)));
    }
    sink.close();

    let stats = sink.stats();
    assert_eq!(stats.accepted, 10);
    assert_eq!(stats.write_failures, 10);
    assert_eq!(stats.written, 0);
    assert_eq!(stats.queued, 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_delivery_preserves_submission_order(
        messages in prop::collection::vec("[a-z]{1,8}", 1..64)
    ) {
        let (writer, recorded) = RecordingWriter::new();
        let sink = AsyncSink::builder().capacity(64).spawn(writer).unwrap();
        for msg in &messages {
            sink.submit(record(msg.as_str()));
        }
        sink.close();
        prop_assert_eq!(recorded.messages(), messages);
    }
}
