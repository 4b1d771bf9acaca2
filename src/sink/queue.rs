//! Bounded record queue.
//!
//! # Responsibilities
//! - Fixed-capacity FIFO between many producers and one consumer
//! - Non-blocking enqueue that reports a full buffer instead of waiting
//! - One-shot "no more producers" signal that lets the consumer drain and exit
//!
//! # Design Decisions
//! - Built on `tokio::sync::mpsc::channel`; `try_send` never waits
//! - The producer half is not `Clone`, so finishing it closes the channel
//! - The consumer blocks an OS thread, never a runtime worker

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::sync::Semaphore;

/// Largest capacity the channel supports.
pub const MAX_CAPACITY: usize = Semaphore::MAX_PERMITS;

/// Why an item was not enqueued. The item is handed back.
#[derive(Debug)]
pub enum Rejected<T> {
    /// The buffer holds `capacity` items.
    Full(T),
    /// The consumer is gone.
    Closed(T),
}

/// Constructor namespace for the queue halves.
pub struct RecordQueue;

impl RecordQueue {
    /// Create a queue holding at most `capacity` items, clamped to
    /// `1..=MAX_CAPACITY`.
    pub fn bounded<T>(capacity: usize) -> (QueueProducer<T>, QueueConsumer<T>) {
        let (tx, rx) = mpsc::channel(capacity.clamp(1, MAX_CAPACITY));
        (QueueProducer { tx }, QueueConsumer { rx })
    }
}

/// Enqueue side of the queue.
#[derive(Debug)]
pub struct QueueProducer<T> {
    tx: mpsc::Sender<T>,
}

impl<T> QueueProducer<T> {
    /// Enqueue without waiting.
    pub fn try_enqueue(&self, item: T) -> Result<(), Rejected<T>> {
        self.tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(item) => Rejected::Full(item),
            TrySendError::Closed(item) => Rejected::Closed(item),
        })
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Signal that nothing else will be enqueued. Buffered items stay
    /// available to the consumer.
    pub fn mark_no_more_producers(self) {
        drop(self.tx);
    }
}

/// Dequeue side of the queue. Exactly one exists per queue.
#[derive(Debug)]
pub struct QueueConsumer<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> QueueConsumer<T> {
    /// Block the current thread until an item is available.
    ///
    /// Returns `None` once the producer has finished and the buffer is empty.
    ///
    /// # Panics
    /// Panics when called from inside an async runtime context.
    pub fn dequeue_blocking(&mut self) -> Option<T> {
        self.rx.blocking_recv()
    }

    /// Take the next item if one is buffered.
    pub fn try_dequeue(&mut self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_try_enqueue_reports_full() {
        let (producer, _consumer) = RecordQueue::bounded::<u32>(2);
        producer.try_enqueue(1).unwrap();
        producer.try_enqueue(2).unwrap();

        match producer.try_enqueue(3) {
            Err(Rejected::Full(3)) => {}
            other => panic!("expected Full(3), got {:?}", other),
        }
        assert_eq!(producer.len(), 2);
        assert_eq!(producer.capacity(), 2);
    }

    #[test]
    fn test_try_enqueue_reports_closed_consumer() {
        let (producer, consumer) = RecordQueue::bounded::<u32>(2);
        drop(consumer);

        match producer.try_enqueue(7) {
            Err(Rejected::Closed(7)) => {}
            other => panic!("expected Closed(7), got {:?}", other),
        }
    }

    #[test]
    fn test_drains_buffered_items_after_finish() {
        let (producer, mut consumer) = RecordQueue::bounded::<u32>(4);
        for i in 0..4 {
            producer.try_enqueue(i).unwrap();
        }
        producer.mark_no_more_producers();

        let drained: Vec<u32> = thread::spawn(move || {
            let mut out = Vec::new();
            while let Some(item) = consumer.dequeue_blocking() {
                out.push(item);
            }
            out
        })
        .join()
        .unwrap();

        assert_eq!(drained, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_dequeue_blocking_waits_for_producer() {
        let (producer, mut consumer) = RecordQueue::bounded::<&'static str>(1);
        let reader = thread::spawn(move || consumer.dequeue_blocking());

        thread::sleep(std::time::Duration::from_millis(20));
        producer.try_enqueue("late").unwrap();

        assert_eq!(reader.join().unwrap(), Some("late"));
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let (producer, mut consumer) = RecordQueue::bounded::<u8>(0);
        assert_eq!(producer.capacity(), 1);
        producer.try_enqueue(1).unwrap();
        assert!(producer.try_enqueue(2).is_err());
        assert_eq!(consumer.try_dequeue(), Some(1));
        assert!(producer.is_empty());
    }

    #[test]
    fn test_oversized_capacity_is_clamped() {
        let (producer, _consumer) = RecordQueue::bounded::<u8>(usize::MAX);
        assert_eq!(producer.capacity(), MAX_CAPACITY);
        producer.try_enqueue(1).unwrap();
        assert_eq!(producer.len(), 1);
    }
}
