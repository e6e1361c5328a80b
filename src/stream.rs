//! Byte-stream plumbing for the filesystem layer.
//!
//! [`open_input`] and [`open_output`] hand back plain byte streams, wrapping
//! them with decompression/compression when the path carries a recognized
//! extension (gzip via `flate2`, behind the `compression-gzip` feature).
//! Parent directories are created on demand for writes. [`DelimReader`] and
//! [`DelimWriter`] frame those streams into delimiter-terminated byte
//! records, the raw currency of the pipelines.

use crate::record::{RecordReader, RecordWriter};
use anyhow::{Context, Result};
use std::fs::{File, create_dir_all};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

#[cfg(feature = "compression-gzip")]
fn is_gzip(path: &Path) -> bool {
    let path = path.to_string_lossy().to_lowercase();
    path.ends_with(".gz") || path.ends_with(".gzip")
}

/// Open a byte source, transparently decompressing by extension.
///
/// # Errors
/// Returns an error if the file cannot be opened.
pub fn open_input(path: impl AsRef<Path>) -> Result<Box<dyn Read + Send>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    #[cfg(feature = "compression-gzip")]
    if is_gzip(path) {
        return Ok(Box::new(flate2::read::GzDecoder::new(BufReader::new(f))));
    }
    Ok(Box::new(BufReader::new(f)))
}

/// Open a byte sink, creating parent directories and transparently
/// compressing by extension.
///
/// # Errors
/// Returns an error if directories or the file cannot be created.
pub fn open_output(path: impl AsRef<Path>) -> Result<Box<dyn Write + Send>> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    #[cfg(feature = "compression-gzip")]
    if is_gzip(path) {
        return Ok(Box::new(flate2::write::GzEncoder::new(
            BufWriter::new(f),
            flate2::Compression::default(),
        )));
    }
    Ok(Box::new(BufWriter::new(f)))
}

/// Recursively delete a directory tree, tolerating a missing root.
///
/// # Errors
/// Returns an error if any entry cannot be removed.
pub fn remove_tree(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(());
    }
    std::fs::remove_dir_all(path).with_context(|| format!("remove tree {}", path.display()))
}

/// Reads delimiter-terminated byte records from a stream.
///
/// The returned records exclude the delimiter. A final record without a
/// trailing delimiter is still returned.
pub struct DelimReader {
    inner: BufReader<Box<dyn Read + Send>>,
    delimiter: u8,
    done: bool,
}

impl DelimReader {
    /// Frame an already-open stream.
    pub fn new(stream: Box<dyn Read + Send>, delimiter: u8) -> Self {
        Self {
            inner: BufReader::new(stream),
            delimiter,
            done: false,
        }
    }

    /// Open a file through [`open_input`] and frame it.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, delimiter: u8) -> Result<Self> {
        Ok(Self::new(open_input(path)?, delimiter))
    }
}

impl RecordReader<Vec<u8>> for DelimReader {
    fn read(&mut self) -> Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }
        let mut record = Vec::new();
        let n = self
            .inner
            .read_until(self.delimiter, &mut record)
            .context("read delimited record")?;
        if n == 0 {
            self.done = true;
            return Ok(None);
        }
        if record.last() == Some(&self.delimiter) {
            record.pop();
        } else {
            // Unterminated trailing record; the stream is exhausted.
            self.done = true;
        }
        Ok(Some(record))
    }
}

/// Writes byte records followed by a delimiter.
pub struct DelimWriter {
    inner: Box<dyn Write + Send>,
    delimiter: u8,
    closed: bool,
}

impl DelimWriter {
    /// Frame an already-open sink.
    pub fn new(stream: Box<dyn Write + Send>, delimiter: u8) -> Self {
        Self {
            inner: stream,
            delimiter,
            closed: false,
        }
    }

    /// Open a file through [`open_output`] and frame it.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create(path: impl AsRef<Path>, delimiter: u8) -> Result<Self> {
        Ok(Self::new(open_output(path)?, delimiter))
    }
}

impl RecordWriter<Vec<u8>> for DelimWriter {
    fn write(&mut self, record: Vec<u8>) -> Result<()> {
        self.inner.write_all(&record).context("write record")?;
        self.inner
            .write_all(&[self.delimiter])
            .context("write record delimiter")
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.inner.flush().context("flush record sink")?;
        // Dropping the real sink finalizes any compression trailer.
        self.inner = Box::new(std::io::sink());
        self.closed = true;
        Ok(())
    }
}
