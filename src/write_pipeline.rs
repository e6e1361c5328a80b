//! Queue-fed parallel record writing.
//!
//! A [`QueuedWriter`] owns one bounded queue and a set of worker threads,
//! each bound to its own underlying writer. Producers block in
//! [`QueuedWriter::write`] when the queue is full; workers drain batches and
//! flush each batch to their writer in one call. Workers only exit once the
//! pipeline has been deactivated *and* the queue is empty, so nothing
//! written before `close` is ever dropped.

use crate::executor::Executor;
use crate::queue::{BoundedQueue, POLL_INTERVAL};
use crate::record::{BoxWriter, RecordWriter};
use anyhow::{Error, Result, anyhow, bail};
use log::{debug, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// Batch size headroom: dividing by `writers + 2` keeps one greedy worker
/// from draining a small queue dry while its siblings starve.
pub(crate) fn batch_size(queue_capacity: usize, writers: usize) -> usize {
    (queue_capacity / (writers + 2)).max(3)
}

type WorkerExit<T> = (BoxWriter<T>, Result<()>);

fn run_write_worker<T>(
    queue: &BoundedQueue<T>,
    active: &AtomicBool,
    writer: &mut BoxWriter<T>,
    batch_capacity: usize,
) -> Result<()> {
    let mut batch = Vec::with_capacity(batch_capacity);
    loop {
        let drained = queue.drain_to(&mut batch, batch_capacity);
        if drained != 0 {
            writer.write_batch(&mut batch)?;
        } else if !active.load(Ordering::SeqCst) && queue.is_empty() {
            // Deactivated and drained: nothing more can arrive.
            return Ok(());
        } else {
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Fans one record stream out to worker-owned writers through a bounded
/// queue.
pub struct QueuedWriter<T> {
    queue: Arc<BoundedQueue<T>>,
    active: Arc<AtomicBool>,
    workers: Vec<JoinHandle<WorkerExit<T>>>,
    closed: bool,
}

impl<T: Send + 'static> QueuedWriter<T> {
    /// Spawn one worker per writer, all draining the same queue.
    ///
    /// Which worker picks up a given record is unspecified; deterministic
    /// placement belongs to a routing layer above or below this one.
    ///
    /// # Errors
    /// Fails if `writers` is empty or worker threads cannot be spawned.
    pub fn new(
        executor: &Executor,
        queue_capacity: usize,
        writers: Vec<BoxWriter<T>>,
    ) -> Result<Self> {
        if writers.is_empty() {
            bail!("write pipeline needs at least one writer");
        }
        let worker_count = writers.len();
        let queue = Arc::new(BoundedQueue::new(queue_capacity));
        let active = Arc::new(AtomicBool::new(true));
        let batch_capacity = batch_size(queue.capacity(), worker_count);

        let mut workers = Vec::with_capacity(worker_count);
        for writer in writers {
            let queue = Arc::clone(&queue);
            let active = Arc::clone(&active);
            workers.push(executor.spawn("write", move || {
                let mut writer = writer;
                let result = run_write_worker(&queue, &active, &mut writer, batch_capacity);
                (writer, result)
            })?);
        }
        debug!(
            "spawned {worker_count} write workers, queue capacity {}, batch size {batch_capacity}",
            queue.capacity()
        );

        Ok(Self {
            queue,
            active,
            workers,
            closed: false,
        })
    }

    /// Blocking enqueue; this is the producer-side backpressure point.
    pub fn push(&self, record: T) {
        self.queue.put(record);
    }

    /// Deactivate, wait for every worker to drain out, then close every
    /// underlying writer in worker order.
    ///
    /// Idempotent: a second call returns `Ok(())` without re-joining.
    ///
    /// # Errors
    /// The first worker or close failure, including translated panics.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.active.store(false, Ordering::SeqCst);

        let mut first: Option<Error> = None;
        let mut record = |err: Error| {
            if first.is_none() {
                first = Some(err);
            } else {
                warn!("additional write pipeline failure: {err:#}");
            }
        };

        let mut finished = Vec::with_capacity(self.workers.len());
        for worker in self.workers.drain(..) {
            match worker.join() {
                Ok((writer, result)) => {
                    if let Err(err) = result {
                        record(err);
                    }
                    finished.push(writer);
                }
                Err(_) => record(anyhow!("write worker panicked")),
            }
        }
        for mut writer in finished {
            if let Err(err) = writer.close() {
                record(err);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl<T: Send + 'static> RecordWriter<T> for QueuedWriter<T> {
    fn write(&mut self, record: T) -> Result<()> {
        self.push(record);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.shutdown()
    }
}
