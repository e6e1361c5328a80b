//! Delimiter-aligned segmentation of input files for parallel reading.
//!
//! A [`SegmentedFile`] memory-maps one input file once, plans a set of
//! contiguous byte-range [`Segment`]s whose boundaries always fall just
//! after a delimiter byte, and hands out one [`SegmentReader`] per segment.
//! Each reader iterates the records of exactly its own range, so the
//! segments can be consumed by independent threads without ever splitting a
//! record.

use crate::record::RecordReader;
use anyhow::{Context, Result, ensure};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One contiguous byte range of an input file.
///
/// Segments of a file are ordered, non-overlapping and gap-free: each
/// segment starts where the previous one ended, and the last one ends at the
/// file's exact byte length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    /// First byte of the range.
    pub offset: u64,
    /// Length of the range in bytes.
    pub size: u64,
}

impl Segment {
    /// One past the last byte of the range.
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.offset + self.size
    }
}

/// Plan delimiter-aligned segments over a file's contents.
///
/// The candidate segment count starts at one and grows by `parallelism`
/// while `len / count` still exceeds `target_bytes` (the first growth step
/// jumps straight to `parallelism`, avoiding a nearly-empty extra segment).
/// Every proposed boundary except the final one is then pushed forward to
/// just past the next delimiter byte, so no record straddles two segments.
/// An empty file yields exactly one zero-size segment.
#[must_use]
pub fn plan_segments(
    data: &[u8],
    target_bytes: u64,
    parallelism: usize,
    delimiter: u8,
) -> Vec<Segment> {
    let len = data.len() as u64;
    if len == 0 {
        return vec![Segment { offset: 0, size: 0 }];
    }

    let step = (parallelism as u64).max(2);
    let mut count = 1u64;
    if target_bytes > 0 {
        while len / count > target_bytes {
            count = if count == 1 { step } else { count + step };
        }
    }
    if count == 1 {
        return vec![Segment {
            offset: 0,
            size: len,
        }];
    }

    let stride = len / count;
    let mut boundaries = Vec::with_capacity(count as usize + 1);
    boundaries.push(0u64);
    for i in 1..count {
        let proposed = (i * stride) as usize;
        // Scan forward to the delimiter (inclusive); records never split.
        let aligned = match memchr::memchr(delimiter, &data[proposed.min(data.len())..]) {
            Some(at) => (proposed + at + 1) as u64,
            None => len,
        };
        // Dense delimiters can push a boundary past the next proposed one;
        // keep boundaries strictly increasing by dropping duplicates.
        if aligned > *boundaries.last().unwrap_or(&0) && aligned < len {
            boundaries.push(aligned);
        }
    }
    boundaries.push(len);

    boundaries
        .windows(2)
        .map(|pair| Segment {
            offset: pair[0],
            size: pair[1] - pair[0],
        })
        .collect()
}

/// An input file mapped read-only, split into delimiter-aligned segments.
///
/// Owns the planned [`Segment`]s; readers hold a shared handle to the map,
/// so the `SegmentedFile` itself may be dropped once readers are out.
pub struct SegmentedFile {
    path: PathBuf,
    data: Arc<Mmap>,
    segments: Vec<Segment>,
    delimiter: u8,
}

impl SegmentedFile {
    /// Map `path` and plan its segments.
    ///
    /// # Errors
    /// Any I/O failure while opening or mapping the file is fatal for the
    /// whole planning call; partially-scanned boundaries are never used.
    pub fn open(
        path: impl AsRef<Path>,
        target_bytes: u64,
        parallelism: usize,
        delimiter: u8,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).with_context(|| format!("open {}", path.display()))?;
        // Read-only map; the file must not be truncated while readers exist.
        let data = unsafe { Mmap::map(&file) }
            .with_context(|| format!("memory-map {}", path.display()))?;
        let segments = plan_segments(&data, target_bytes, parallelism, delimiter);
        Ok(Self {
            path,
            data: Arc::new(data),
            segments,
            delimiter,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// A reader over segment `index`.
    ///
    /// # Errors
    /// Fails if `index` is out of range.
    pub fn reader(&self, index: usize) -> Result<SegmentReader> {
        ensure!(
            index < self.segments.len(),
            "segment index {index} out of range for {} segments",
            self.segments.len()
        );
        let segment = self.segments[index];
        Ok(SegmentReader::new(
            Arc::clone(&self.data),
            segment,
            self.delimiter,
        ))
    }

    /// One reader per planned segment, in offset order.
    #[must_use]
    pub fn readers(&self) -> Vec<SegmentReader> {
        self.segments
            .iter()
            .map(|&segment| SegmentReader::new(Arc::clone(&self.data), segment, self.delimiter))
            .collect()
    }
}

/// Sequential record reads over one segment's byte range.
///
/// Not thread-safe; intended for exactly one thread. Yields `None` at the
/// end of the segment's range, not the end of the file.
pub struct SegmentReader {
    data: Arc<Mmap>,
    pos: usize,
    end: usize,
    delimiter: u8,
}

impl SegmentReader {
    fn new(data: Arc<Mmap>, segment: Segment, delimiter: u8) -> Self {
        let pos = segment.offset as usize;
        let end = segment.limit() as usize;
        Self {
            data,
            pos,
            end,
            delimiter,
        }
    }
}

impl RecordReader<Vec<u8>> for SegmentReader {
    fn read(&mut self) -> Result<Option<Vec<u8>>> {
        if self.pos >= self.end {
            return Ok(None);
        }
        let window = &self.data[self.pos..self.end];
        match memchr::memchr(self.delimiter, window) {
            Some(at) => {
                let record = window[..at].to_vec();
                self.pos += at + 1;
                Ok(Some(record))
            }
            None => {
                // Unterminated trailing record at the end of the range.
                let record = window.to_vec();
                self.pos = self.end;
                Ok(Some(record))
            }
        }
    }
}
