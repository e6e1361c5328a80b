//! Worker-thread spawning.
//!
//! Pipelines take an [`Executor`] handle explicitly instead of reaching for a
//! process-wide singleton; [`default_executor`] offers a shared,
//! lazily-created default for callers that don't care.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

/// Cap applied to the CPU-derived default parallelism.
const MAX_DEFAULT_PARALLELISM: usize = 32;

/// Spawns named worker threads for pipelines.
///
/// Every worker is a dedicated OS thread that lives for the pipeline's
/// lifetime; there is no task scheduling on top.
pub struct Executor {
    prefix: String,
    seq: AtomicUsize,
}

impl Executor {
    /// Create an executor whose threads are named `{prefix}-{role}-{n}`.
    pub fn new(prefix: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            prefix: prefix.into(),
            seq: AtomicUsize::new(0),
        })
    }

    /// Spawn one named worker thread.
    ///
    /// # Errors
    /// Returns an error if the OS refuses to create the thread.
    pub fn spawn<F, T>(&self, role: &str, f: F) -> Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let id = self.seq.fetch_add(1, Ordering::Relaxed);
        thread::Builder::new()
            .name(format!("{}-{role}-{id}", self.prefix))
            .spawn(f)
            .with_context(|| format!("spawn {role} worker thread"))
    }
}

/// The shared default executor, created on first use.
pub fn default_executor() -> Arc<Executor> {
    static DEFAULT: OnceLock<Arc<Executor>> = OnceLock::new();
    DEFAULT.get_or_init(|| Executor::new("shardpipe")).clone()
}

/// Default worker count: the CPU count, capped at 32.
#[must_use]
pub fn default_parallelism() -> usize {
    num_cpus::get().clamp(1, MAX_DEFAULT_PARALLELISM)
}
