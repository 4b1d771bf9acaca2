//! One-shot drain latch.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Released exactly once, when the consumer has drained the queue and exited.
#[derive(Debug, Default)]
pub struct DrainLatch {
    released: Mutex<bool>,
    cond: Condvar,
}

impl DrainLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn release(&self) {
        let mut released = self.released.lock().unwrap_or_else(PoisonError::into_inner);
        *released = true;
        self.cond.notify_all();
    }

    pub fn is_released(&self) -> bool {
        *self.released.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until released.
    pub fn wait(&self) {
        let mut released = self.released.lock().unwrap_or_else(PoisonError::into_inner);
        while !*released {
            released = self.cond.wait(released).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until released or `timeout` elapses. Returns whether it was released.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let released = self.released.lock().unwrap_or_else(PoisonError::into_inner);
        let (released, _) = self
            .cond
            .wait_timeout_while(released, timeout, |released| !*released)
            .unwrap_or_else(PoisonError::into_inner);
        *released
    }
}
