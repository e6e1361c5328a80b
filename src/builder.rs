//! Pipeline topology assembly.
//!
//! The builder decides, for `N` shards and a requested parallelism, how many
//! bounded queues to create and how shards group under them:
//!
//! | shards | queues | topology |
//! |--------|--------|----------|
//! | 1      | —      | single queue, single worker, no routing |
//! | N      | 1      | one queue; its worker fans out across all N shards |
//! | N      | N      | one queue and one dedicated worker per shard |
//! | N      | Q, 1<Q<N | Q queues; `ceil(N/Q)` shards per queue, short groups padded with no-op writers |
//!
//! The padding in the last row is deliberate: it keeps the within-group
//! modulus fixed at `ceil(N/Q)` so routing stays deterministic when `N`
//! doesn't divide evenly, at the cost of a slightly uneven distribution.

use crate::executor::{Executor, default_executor, default_parallelism};
use crate::read_pipeline::QueuedReader;
use crate::record::{BoxReader, BoxWriter, NullWriter, RecordWriter};
use crate::router::{ShardKey, ShardRouter};
use crate::segment::SegmentedFile;
use crate::sharded::{ShardedFile, ShardedWriter};
use crate::stats::Throughput;
use crate::stream::{DelimReader, DelimWriter};
use crate::write_pipeline::QueuedWriter;
use anyhow::{Context, Error, Result, bail};
use log::warn;
use std::path::Path;
use std::sync::Arc;

/// Default bounded-queue capacity, shared across a writer's queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Per-queue floor; queues smaller than this thrash without helping.
const MIN_QUEUE_CAPACITY: usize = 3;

fn capacity_per_queue(total: usize, queues: usize) -> usize {
    (total / queues.max(1)).max(MIN_QUEUE_CAPACITY)
}

/// Assembles read and write pipelines.
///
/// ```no_run
/// use shardpipe::{PipelineBuilder, ShardedFile};
///
/// # fn main() -> anyhow::Result<()> {
/// let target = ShardedFile::new("out/data.txt", 4)?;
/// let builder = PipelineBuilder::new().parallelism(4).queue_capacity(256);
/// let mut writer = builder.write_sharded(&target)?;
/// for line in ["alpha", "beta", "gamma"] {
///     writer.push(line.as_bytes().to_vec());
/// }
/// writer.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub struct PipelineBuilder {
    queue_capacity: usize,
    parallelism: usize,
    executor: Arc<Executor>,
    statistics: Option<String>,
    delimiter: u8,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            parallelism: default_parallelism(),
            executor: default_executor(),
            statistics: None,
            delimiter: b'\n',
        }
    }
}

impl PipelineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total queue capacity, split across the queues of a built writer.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Worker/queue parallelism. Defaults to the CPU count, capped at 32.
    #[must_use]
    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Use a specific executor instead of the shared default.
    #[must_use]
    pub fn executor(mut self, executor: Arc<Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Enable a named throughput counter on built pipelines.
    #[must_use]
    pub fn statistics(mut self, name: impl Into<String>) -> Self {
        self.statistics = Some(name.into());
        self
    }

    /// Record delimiter for file-backed pipelines. Defaults to `\n`.
    #[must_use]
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn throughput(&self) -> Option<Throughput> {
        self.statistics.as_deref().map(Throughput::new)
    }

    /// Assemble a routed write pipeline over one writer per shard.
    ///
    /// `shard_writers[i]` is the sink for shard `i`; routing follows the
    /// topology table in the module docs. Workers start immediately.
    ///
    /// # Errors
    /// Fails on an empty writer list or if workers cannot be spawned.
    pub fn build_writer<T>(&self, shard_writers: Vec<BoxWriter<T>>) -> Result<RoutedWriter<T>>
    where
        T: ShardKey + Send + 'static,
    {
        if shard_writers.is_empty() {
            bail!("write pipeline needs at least one shard writer");
        }
        let shard_count = u32::try_from(shard_writers.len()).context("too many shards")?;
        let router = ShardRouter::for_shards(shard_count)?;

        let queue_count = self.parallelism.min(shard_count as usize).max(1) as u32;
        let group = shard_count.div_ceil(queue_count);
        let queues_used = shard_count.div_ceil(group);
        let per_queue_capacity = capacity_per_queue(self.queue_capacity, queues_used as usize);

        let mut remaining = shard_writers.into_iter();
        let mut queues = Vec::with_capacity(queues_used as usize);
        for _ in 0..queues_used {
            let mut group_writers: Vec<BoxWriter<T>> =
                remaining.by_ref().take(group as usize).collect();
            let queue_writer: BoxWriter<T> = if group == 1 {
                group_writers.pop().expect("group is non-empty")
            } else {
                // Short final group: pad with no-op writers so the
                // within-group modulus stays `group` for every queue.
                while group_writers.len() < group as usize {
                    group_writers.push(NullWriter::boxed());
                }
                Box::new(ShardedWriter::new(
                    group_writers,
                    ShardRouter::within_group(shard_count, group)?,
                )?)
            };
            queues.push(QueuedWriter::new(
                &self.executor,
                per_queue_capacity,
                vec![queue_writer],
            )?);
        }

        Ok(RoutedWriter {
            queues,
            router,
            group,
            stats: self.throughput(),
            closed: false,
        })
    }

    /// Routed write pipeline over the shard files of `target`, framed with
    /// the configured delimiter.
    ///
    /// # Errors
    /// Fails if any shard file cannot be created.
    pub fn write_sharded(&self, target: &ShardedFile) -> Result<RoutedWriter<Vec<u8>>> {
        let writers = target
            .paths()
            .iter()
            .map(|path| {
                DelimWriter::create(path, self.delimiter)
                    .map(|writer| Box::new(writer) as BoxWriter<Vec<u8>>)
            })
            .collect::<Result<Vec<_>>>()?;
        self.build_writer(writers)
    }

    /// Queue-fed read pipeline over an explicit list of sources.
    ///
    /// # Errors
    /// Fails if worker threads cannot be spawned.
    pub fn build_reader<T>(&self, sources: Vec<BoxReader<T>>) -> Result<QueuedReader<T>>
    where
        T: Send + 'static,
    {
        let mut reader = QueuedReader::new(
            &self.executor,
            self.queue_capacity,
            self.parallelism,
            sources,
        )?;
        if let Some(stats) = self.throughput() {
            reader.set_throughput(stats);
        }
        Ok(reader)
    }

    /// Read delimiter-framed records from a list of files in parallel.
    ///
    /// # Errors
    /// Fails if any file cannot be opened.
    pub fn read_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<QueuedReader<Vec<u8>>> {
        let sources = paths
            .iter()
            .map(|path| {
                DelimReader::open(path, self.delimiter)
                    .map(|reader| Box::new(reader) as BoxReader<Vec<u8>>)
            })
            .collect::<Result<Vec<_>>>()?;
        self.build_reader(sources)
    }

    /// Read every shard file of `target` in parallel.
    ///
    /// # Errors
    /// Fails if any shard file cannot be opened.
    pub fn read_sharded(&self, target: &ShardedFile) -> Result<QueuedReader<Vec<u8>>> {
        self.read_files(target.paths())
    }

    /// Read one large file in parallel by planning delimiter-aligned
    /// segments and giving each worker its own byte range.
    ///
    /// # Errors
    /// Planning failures (open/map) abort before any worker starts.
    pub fn read_segmented(
        &self,
        path: impl AsRef<Path>,
        target_segment_bytes: u64,
    ) -> Result<QueuedReader<Vec<u8>>> {
        let file = SegmentedFile::open(
            path,
            target_segment_bytes,
            self.parallelism,
            self.delimiter,
        )?;
        let sources = file
            .readers()
            .into_iter()
            .map(|reader| Box::new(reader) as BoxReader<Vec<u8>>)
            .collect();
        self.build_reader(sources)
    }
}

/// The write side of a built topology: routes records to queues, queues to
/// shard writers.
///
/// Within one shard, records from a single producer keep their order;
/// across shards there is no global ordering. That asymmetry is a property
/// of the design, not a defect.
pub struct RoutedWriter<T> {
    queues: Vec<QueuedWriter<T>>,
    router: ShardRouter,
    group: u32,
    stats: Option<Throughput>,
    closed: bool,
}

impl<T: ShardKey + Send + 'static> RoutedWriter<T> {
    #[must_use]
    pub fn shard_count(&self) -> u32 {
        self.router.shards()
    }

    #[must_use]
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    #[must_use]
    pub fn throughput(&self) -> Option<&Throughput> {
        self.stats.as_ref()
    }

    /// Route and enqueue one record; blocks while the target queue is full.
    pub fn push(&self, record: T) {
        let shard = self.router.route(&record);
        let queue = (shard / self.group) as usize;
        self.queues[queue].push(record);
        if let Some(stats) = &self.stats {
            stats.add(1);
        }
    }

    /// Declare the stream finished, drain every queue and close every shard
    /// writer. Idempotent.
    ///
    /// # Errors
    /// The first failure from any queue's workers or writers.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut first: Option<Error> = None;
        for queue in &mut self.queues {
            if let Err(err) = queue.shutdown() {
                if first.is_none() {
                    first = Some(err);
                } else {
                    warn!("additional queue shutdown failure: {err:#}");
                }
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl<T: ShardKey + Send + 'static> RecordWriter<T> for RoutedWriter<T> {
    fn write(&mut self, record: T) -> Result<()> {
        self.push(record);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.shutdown()
    }
}
