//! Named throughput counters and the reader/writer decorators that feed
//! them.
//!
//! A [`Throughput`] is a cheap shared handle; clone it before handing it to
//! a pipeline and read the counts from either side. Decorators wrap any
//! [`RecordReader`]/[`RecordWriter`] and count records as they pass.

use crate::record::{RecordReader, RecordWriter};
use anyhow::Result;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

struct ThroughputInner {
    name: String,
    records: AtomicU64,
    started: Instant,
}

/// A named, thread-safe record counter with a rate view.
#[derive(Clone)]
pub struct Throughput {
    inner: Arc<ThroughputInner>,
}

impl Throughput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ThroughputInner {
                name: name.into(),
                records: AtomicU64::new(0),
                started: Instant::now(),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn add(&self, records: u64) {
        self.inner.records.fetch_add(records, Ordering::Relaxed);
    }

    #[must_use]
    pub fn records(&self) -> u64 {
        self.inner.records.load(Ordering::Relaxed)
    }

    /// Records per second since the counter was created.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn per_second(&self) -> f64 {
        let elapsed = self.inner.started.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.records() as f64 / elapsed
    }

    /// Snapshot as a JSON object, suitable for logging or saving.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name(),
            "records": self.records(),
            "elapsed_ms": self.inner.started.elapsed().as_millis() as u64,
            "records_per_sec": self.per_second(),
        })
    }
}

/// Counts every record handed out by the wrapped reader.
pub struct CountingReader<R> {
    inner: R,
    stats: Throughput,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R, stats: Throughput) -> Self {
        Self { inner, stats }
    }

    #[must_use]
    pub fn stats(&self) -> &Throughput {
        &self.stats
    }
}

impl<T, R: RecordReader<T>> RecordReader<T> for CountingReader<R> {
    fn read(&mut self) -> Result<Option<T>> {
        let record = self.inner.read()?;
        if record.is_some() {
            self.stats.add(1);
        }
        Ok(record)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

/// Counts every record accepted by the wrapped writer.
pub struct CountingWriter<W> {
    inner: W,
    stats: Throughput,
}

impl<W> CountingWriter<W> {
    pub fn new(inner: W, stats: Throughput) -> Self {
        Self { inner, stats }
    }

    #[must_use]
    pub fn stats(&self) -> &Throughput {
        &self.stats
    }
}

impl<T, W: RecordWriter<T>> RecordWriter<T> for CountingWriter<W> {
    fn write(&mut self, record: T) -> Result<()> {
        self.inner.write(record)?;
        self.stats.add(1);
        Ok(())
    }

    fn write_batch(&mut self, batch: &mut Vec<T>) -> Result<()> {
        let count = batch.len() as u64;
        self.inner.write_batch(batch)?;
        self.stats.add(count);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}
