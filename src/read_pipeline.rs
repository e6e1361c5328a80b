//! Queue-fed parallel record reading.
//!
//! A [`QueuedReader`] spawns worker threads that pull sources from a shared
//! pending pool, read each one to exhaustion and push every record into one
//! bounded queue. The consuming side polls the queue; `None` is only
//! surfaced once every worker has finished *and* the queue is drained.
//! Worker failures are captured and rethrown from [`QueuedReader::close`],
//! never out of `read`.

use crate::executor::Executor;
use crate::queue::{BoundedQueue, POLL_INTERVAL};
use crate::record::{BoxReader, RecordReader};
use crate::stats::Throughput;
use anyhow::{Error, Result, anyhow};
use log::{debug, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Decrements the running-worker count when the worker exits, even by panic.
struct RunningGuard(Arc<AtomicUsize>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn pump<T>(reader: &mut BoxReader<T>, queue: &BoundedQueue<T>) -> Result<()> {
    while let Some(record) = reader.read()? {
        // Blocks while the queue is full; slow consumers throttle us here.
        queue.put(record);
    }
    Ok(())
}

fn run_read_worker<T>(
    pool: &Mutex<Vec<BoxReader<T>>>,
    queue: &BoundedQueue<T>,
) -> Result<()> {
    loop {
        let next = pool
            .lock()
            .map_err(|_| anyhow!("pending-source pool poisoned"))?
            .pop();
        let Some(mut reader) = next else {
            return Ok(());
        };
        let pumped = pump(&mut reader, queue);
        let closed = reader.close();
        pumped?;
        closed?;
    }
}

/// Fans multiple record sources into one bounded queue.
pub struct QueuedReader<T> {
    queue: Arc<BoundedQueue<T>>,
    pool: Arc<Mutex<Vec<BoxReader<T>>>>,
    running: Arc<AtomicUsize>,
    workers: Vec<JoinHandle<Result<()>>>,
    stats: Option<Throughput>,
    closed: bool,
}

impl<T: Send + 'static> QueuedReader<T> {
    /// Spawn up to `parallelism` workers over `sources`.
    ///
    /// Workers start reading immediately. Each worker owns one source at a
    /// time; the queue is the only structure they share.
    ///
    /// # Errors
    /// Returns an error if worker threads cannot be spawned.
    pub fn new(
        executor: &Executor,
        queue_capacity: usize,
        parallelism: usize,
        sources: Vec<BoxReader<T>>,
    ) -> Result<Self> {
        let source_count = sources.len();
        let queue = Arc::new(BoundedQueue::new(queue_capacity));
        let pool = Arc::new(Mutex::new(sources));
        let worker_count = parallelism.max(1).min(source_count);
        let running = Arc::new(AtomicUsize::new(worker_count));

        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let queue = Arc::clone(&queue);
            let pool = Arc::clone(&pool);
            let guard = RunningGuard(Arc::clone(&running));
            workers.push(executor.spawn("read", move || {
                let _guard = guard;
                run_read_worker(&pool, &queue)
            })?);
        }
        debug!("spawned {worker_count} read workers over {source_count} sources");

        Ok(Self {
            queue,
            pool,
            running,
            workers,
            stats: None,
            closed: false,
        })
    }

    /// Attach a throughput counter; every record handed out increments it.
    pub fn set_throughput(&mut self, stats: Throughput) {
        self.stats = Some(stats);
    }

    #[must_use]
    pub fn throughput(&self) -> Option<&Throughput> {
        self.stats.as_ref()
    }

    /// Next record from any source; `None` once every worker has finished
    /// and the queue is drained.
    ///
    /// Polls the queue *before* checking worker state, so a record enqueued
    /// in the same instant the last worker exits is never lost.
    pub fn read(&self) -> Option<T> {
        loop {
            if let Some(record) = self.queue.poll() {
                if let Some(stats) = &self.stats {
                    stats.add(1);
                }
                return Some(record);
            }
            if self.running.load(Ordering::SeqCst) == 0 && self.queue.is_empty() {
                return None;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Bulk-drain up to `max` records into `out`; returns the number moved.
    ///
    /// A zero-length drain falls back to one blocking [`read`](Self::read),
    /// so callers never busy-loop against producers that are merely slow
    /// rather than finished.
    pub fn drain_to(&self, out: &mut Vec<T>, max: usize) -> usize {
        let moved = self.queue.drain_to(out, max);
        if moved != 0 {
            if let Some(stats) = &self.stats {
                stats.add(moved as u64);
            }
            return moved;
        }
        match self.read() {
            Some(record) => {
                out.push(record);
                1
            }
            None => 0,
        }
    }

    /// Wait for every worker, close every source, surface the first error.
    ///
    /// Idempotent: a second call returns `Ok(())` without re-joining.
    ///
    /// # Errors
    /// The first worker or close failure, including translated panics.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut first: Option<Error> = None;
        let mut record = |err: Error| {
            if first.is_none() {
                first = Some(err);
            } else {
                warn!("additional read pipeline failure: {err:#}");
            }
        };

        for worker in self.workers.drain(..) {
            match worker.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => record(err),
                Err(_) => record(anyhow!("read worker panicked")),
            }
        }
        // Sources an errored worker never reached still need closing.
        if let Ok(mut pool) = self.pool.lock() {
            for mut reader in pool.drain(..) {
                if let Err(err) = reader.close() {
                    record(err);
                }
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl<T: Send + 'static> RecordReader<T> for QueuedReader<T> {
    fn read(&mut self) -> Result<Option<T>> {
        Ok(QueuedReader::read(self))
    }

    fn close(&mut self) -> Result<()> {
        QueuedReader::close(self)
    }
}
