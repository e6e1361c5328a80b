//! Record-level capability traits and composition helpers.
//!
//! Everything in the pipeline moves through two narrow seams:
//! [`RecordReader`] (`read` until `None`, then `close`) and [`RecordWriter`]
//! (`write`/`write_batch`, then `close`). Composition happens through free
//! functions ([`decoded`], [`encoded`]) rather than inheritance, so a typed
//! codec can be attached to any byte-record source or sink.

use anyhow::Result;
use std::marker::PhantomData;

/// A sequential source of records.
///
/// Readers are used by exactly one thread at a time and are not required to
/// be re-readable. `read` returning `None` means the source is exhausted;
/// it is not an error.
pub trait RecordReader<T>: Send {
    /// Pull the next record, or `None` once the source is exhausted.
    fn read(&mut self) -> Result<Option<T>>;

    /// Release underlying resources. Must tolerate repeated calls.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A sequential sink for records.
pub trait RecordWriter<T>: Send {
    /// Write a single record.
    fn write(&mut self, record: T) -> Result<()>;

    /// Write a drained batch in one call.
    ///
    /// The default forwards item-by-item; sinks with expensive per-call
    /// overhead may override to amortize it.
    fn write_batch(&mut self, batch: &mut Vec<T>) -> Result<()> {
        for record in batch.drain(..) {
            self.write(record)?;
        }
        Ok(())
    }

    /// Flush and release underlying resources. Must tolerate repeated calls.
    fn close(&mut self) -> Result<()>;
}

/// A boxed reader, as stored in worker source pools.
pub type BoxReader<T> = Box<dyn RecordReader<T>>;

/// A boxed writer, as stored in worker writer slots.
pub type BoxWriter<T> = Box<dyn RecordWriter<T>>;

impl<T> RecordReader<T> for BoxReader<T> {
    fn read(&mut self) -> Result<Option<T>> {
        (**self).read()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl<T> RecordWriter<T> for BoxWriter<T> {
    fn write(&mut self, record: T) -> Result<()> {
        (**self).write(record)
    }

    fn write_batch(&mut self, batch: &mut Vec<T>) -> Result<()> {
        (**self).write_batch(batch)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Adapt a raw-record reader with a decoding function.
///
/// Records the codec rejects (`None`) are skipped, not treated as end of
/// stream; a malformed line costs one record, never the rest of the source.
pub fn decoded<R, T, U, F>(reader: R, decode: F) -> Decoded<R, F, T>
where
    R: RecordReader<T>,
    F: FnMut(T) -> Option<U> + Send,
{
    Decoded {
        inner: reader,
        decode,
        _raw: PhantomData,
    }
}

/// Reader adapter produced by [`decoded`].
pub struct Decoded<R, F, T> {
    inner: R,
    decode: F,
    _raw: PhantomData<fn() -> T>,
}

impl<R, T, U, F> RecordReader<U> for Decoded<R, F, T>
where
    R: RecordReader<T>,
    F: FnMut(T) -> Option<U> + Send,
{
    fn read(&mut self) -> Result<Option<U>> {
        while let Some(raw) = self.inner.read()? {
            if let Some(record) = (self.decode)(raw) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

/// Adapt a raw-record writer with an encoding function.
pub fn encoded<W, T, U, F>(writer: W, encode: F) -> Encoded<W, F, T>
where
    W: RecordWriter<T>,
    F: FnMut(U) -> T + Send,
{
    Encoded {
        inner: writer,
        encode,
        _raw: PhantomData,
    }
}

/// Writer adapter produced by [`encoded`].
pub struct Encoded<W, F, T> {
    inner: W,
    encode: F,
    _raw: PhantomData<fn() -> T>,
}

impl<W, T, U, F> RecordWriter<U> for Encoded<W, F, T>
where
    W: RecordWriter<T>,
    F: FnMut(U) -> T + Send,
    T: Send,
{
    fn write(&mut self, record: U) -> Result<()> {
        self.inner.write((self.encode)(record))
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

/// A writer that discards everything.
///
/// Used to pad short shard groups so every group has the same width and the
/// within-group modulus stays fixed.
pub struct NullWriter<T> {
    _record: PhantomData<fn(T)>,
}

impl<T> NullWriter<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _record: PhantomData,
        }
    }

    /// Boxed constructor, convenient for writer arrays.
    #[must_use]
    pub fn boxed() -> BoxWriter<T>
    where
        T: Send + 'static,
    {
        Box::new(Self::new())
    }
}

impl<T> Default for NullWriter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> RecordWriter<T> for NullWriter<T> {
    fn write(&mut self, _record: T) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// An in-memory reader over a vector, mostly useful as a test source.
pub struct VecReader<T> {
    items: std::vec::IntoIter<T>,
}

impl<T> VecReader<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl<T: Send> RecordReader<T> for VecReader<T> {
    fn read(&mut self) -> Result<Option<T>> {
        Ok(self.items.next())
    }
}

/// An in-memory writer collecting into a vector.
#[derive(Default)]
pub struct VecWriter<T> {
    items: Vec<T>,
}

impl<T> VecWriter<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Consume the writer and return everything written so far.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }
}

impl<T: Send> RecordWriter<T> for VecWriter<T> {
    fn write(&mut self, record: T) -> Result<()> {
        self.items.push(record);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
