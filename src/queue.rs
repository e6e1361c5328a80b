//! Fixed-capacity blocking work queue shared between pipeline workers.
//!
//! Backed by a lock-free `crossbeam_queue::ArrayQueue`. Blocking semantics
//! come from short sleep polling rather than a condition variable; the 1 ms
//! interval puts a small latency floor on wakeups but keeps the blocking and
//! backpressure contracts trivially correct. See the builder docs for the
//! trade-off.

use crossbeam_queue::ArrayQueue;
use std::thread;
use std::time::Duration;

/// Sleep interval for blocked producers and starved consumers.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A bounded FIFO: `put` blocks while full, `poll` never blocks.
///
/// Shared by every producer and consumer worker attached to a pipeline; a
/// full queue is the backpressure mechanism that throttles fast producers to
/// the pace of slow consumers.
pub struct BoundedQueue<T> {
    inner: ArrayQueue<T>,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// Enqueue, sleeping in [`POLL_INTERVAL`] steps while the queue is full.
    pub fn put(&self, item: T) {
        let mut item = item;
        loop {
            match self.inner.push(item) {
                Ok(()) => return,
                Err(rejected) => {
                    item = rejected;
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }

    /// Non-blocking dequeue.
    pub fn poll(&self) -> Option<T> {
        self.inner.pop()
    }

    /// Bulk-remove up to `max` items into `out`; returns the number moved.
    pub fn drain_to(&self, out: &mut Vec<T>, max: usize) -> usize {
        let mut moved = 0;
        while moved < max {
            match self.inner.pop() {
                Some(item) => {
                    out.push(item);
                    moved += 1;
                }
                None => break,
            }
        }
        moved
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}
