//! # Shardpipe
//!
//! Concurrent sharded record I/O: read large delimited files in parallel by
//! byte-aligned segments, and write record streams across multiple shard
//! files through bounded, backpressured work queues.
//!
//! ## Key pieces
//!
//! - **Segments** — [`SegmentedFile`] memory-maps one input and plans
//!   delimiter-aligned byte ranges; every [`SegmentReader`] iterates its own
//!   range without ever splitting a record.
//! - **Routing** — [`ShardRouter`] maps an item's stable hash
//!   ([`ShardKey`]) to a shard index: a bit mask for power-of-two shard
//!   counts, a general modulo otherwise. Deterministic across runs.
//! - **Queues** — [`BoundedQueue`] blocks producers when full; that is the
//!   whole backpressure story.
//! - **Pipelines** — [`QueuedReader`] fans N sources into one queue through
//!   dedicated worker threads; [`QueuedWriter`] drains one queue into
//!   worker-owned writers in flushed batches.
//! - **Topology** — [`PipelineBuilder`] decides queues-per-writer and
//!   shards-per-queue, pads uneven groups with no-op writers, and can hang a
//!   named [`Throughput`] counter on the result.
//!
//! ## Quick start
//!
//! ```no_run
//! use shardpipe::{PipelineBuilder, ShardedFile};
//!
//! # fn main() -> anyhow::Result<()> {
//! // Fan 4 shard files out of one stream of lines.
//! let target = ShardedFile::new("out/events.log", 4)?;
//! let builder = PipelineBuilder::new().parallelism(4).queue_capacity(1024);
//!
//! let mut writer = builder.write_sharded(&target)?;
//! for i in 0..10_000u32 {
//!     writer.push(format!("event-{i}").into_bytes());
//! }
//! writer.shutdown()?;
//!
//! // Read them all back, order unspecified across shards.
//! let mut reader = builder.read_sharded(&target)?;
//! let mut total = 0usize;
//! while let Some(_record) = reader.read() {
//!     total += 1;
//! }
//! reader.close()?;
//! assert_eq!(total, 10_000);
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees and non-guarantees
//!
//! Within one shard, records from a single source keep their order. Across
//! shards there is **no** global ordering. Queued records live in memory
//! only; a crash loses whatever was in flight. Worker failures are captured
//! where they happen and rethrown from `close`/`shutdown`, never from the
//! hot path, and they never corrupt the shared queue or take sibling
//! workers down early.
//!
//! ## Compression
//!
//! With the `compression-gzip` feature (on by default), file-backed readers
//! and writers transparently decompress/compress paths ending in `.gz`.

pub mod builder;
pub mod executor;
pub mod queue;
pub mod read_pipeline;
pub mod record;
pub mod router;
pub mod segment;
pub mod sharded;
pub mod stats;
pub mod stream;
pub mod write_pipeline;

pub use builder::{DEFAULT_QUEUE_CAPACITY, PipelineBuilder, RoutedWriter};
pub use executor::{Executor, default_executor, default_parallelism};
pub use queue::BoundedQueue;
pub use read_pipeline::QueuedReader;
pub use record::{
    BoxReader, BoxWriter, NullWriter, RecordReader, RecordWriter, VecReader, VecWriter, decoded,
    encoded,
};
pub use router::{ShardKey, ShardRouter};
pub use segment::{Segment, SegmentReader, SegmentedFile, plan_segments};
pub use sharded::{ShardedFile, ShardedWriter};
pub use stats::{CountingReader, CountingWriter, Throughput};
pub use stream::{DelimReader, DelimWriter, open_input, open_output, remove_tree};
pub use write_pipeline::QueuedWriter;
