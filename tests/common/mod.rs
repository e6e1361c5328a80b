#![allow(dead_code)]

use anyhow::{Result, anyhow};
use shardpipe::{RecordReader, RecordWriter};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Collects written records behind a shared handle, so tests can inspect
/// what a worker-owned writer received.
pub struct SharedVecWriter<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> SharedVecWriter<T> {
    pub fn new() -> (Self, Arc<Mutex<Vec<T>>>) {
        let items = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                items: Arc::clone(&items),
            },
            items,
        )
    }
}

impl<T: Send> RecordWriter<T> for SharedVecWriter<T> {
    fn write(&mut self, record: T) -> Result<()> {
        self.items.lock().unwrap().push(record);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Fails every write.
pub struct FailingWriter;

impl<T: Send> RecordWriter<T> for FailingWriter {
    fn write(&mut self, _record: T) -> Result<()> {
        Err(anyhow!("simulated write failure"))
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes fine, fails on close.
pub struct FailOnCloseWriter<T> {
    pub items: Vec<T>,
}

impl<T> FailOnCloseWriter<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Send> RecordWriter<T> for FailOnCloseWriter<T> {
    fn write(&mut self, record: T) -> Result<()> {
        self.items.push(record);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Err(anyhow!("simulated close failure"))
    }
}

/// Blocks every write until the gate opens, counting successes.
pub struct GatedWriter {
    pub gate: Arc<AtomicBool>,
    pub written: Arc<AtomicUsize>,
}

impl GatedWriter {
    pub fn new() -> (Self, Arc<AtomicBool>, Arc<AtomicUsize>) {
        let gate = Arc::new(AtomicBool::new(false));
        let written = Arc::new(AtomicUsize::new(0));
        (
            Self {
                gate: Arc::clone(&gate),
                written: Arc::clone(&written),
            },
            gate,
            written,
        )
    }
}

impl<T: Send> RecordWriter<T> for GatedWriter {
    fn write(&mut self, _record: T) -> Result<()> {
        while !self.gate.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
        self.written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Yields a fixed number of records, then fails.
pub struct FailingReader {
    pub remaining: usize,
}

impl RecordReader<u32> for FailingReader {
    fn read(&mut self) -> Result<Option<u32>> {
        if self.remaining == 0 {
            return Err(anyhow!("simulated read failure"));
        }
        self.remaining -= 1;
        Ok(Some(self.remaining as u32))
    }
}

/// Records whether close was ever called.
pub struct CloseTrackingReader {
    pub closed: Arc<AtomicBool>,
}

impl CloseTrackingReader {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        (
            Self {
                closed: Arc::clone(&closed),
            },
            closed,
        )
    }
}

impl RecordReader<u32> for CloseTrackingReader {
    fn read(&mut self) -> Result<Option<u32>> {
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
