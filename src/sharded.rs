//! Shard file naming and fan-out writing.
//!
//! A [`ShardedFile`] names the `N` concrete files that together make up one
//! logical output: `dir/base.ext` becomes `dir/base00.ext` .. `dir/baseNN.ext`,
//! with the index zero-padded to the width of `N - 1`. A [`ShardedWriter`]
//! routes each record to exactly one of its wrapped writers through a
//! [`ShardRouter`].

use crate::record::{BoxWriter, RecordWriter};
use crate::router::{ShardKey, ShardRouter};
use crate::stream::remove_tree;
use anyhow::{Error, Result, bail};
use log::warn;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// A template path expanded into a fixed set of shard file paths.
///
/// The concrete paths are derived lazily once and cached; the files
/// themselves are created by whichever writer first opens them.
pub struct ShardedFile {
    template: PathBuf,
    shards: u32,
    paths: OnceLock<Vec<PathBuf>>,
}

impl ShardedFile {
    /// Describe `shards` files derived from `template`.
    ///
    /// # Errors
    /// Fails if `shards` is zero.
    pub fn new(template: impl AsRef<Path>, shards: u32) -> Result<Self> {
        if shards == 0 {
            bail!("sharded file needs at least one shard");
        }
        Ok(Self {
            template: template.as_ref().to_path_buf(),
            shards,
            paths: OnceLock::new(),
        })
    }

    #[must_use]
    pub fn template(&self) -> &Path {
        &self.template
    }

    #[must_use]
    pub fn shard_count(&self) -> u32 {
        self.shards
    }

    /// The derived shard paths, in shard-index order.
    pub fn paths(&self) -> &[PathBuf] {
        self.paths.get_or_init(|| self.derive_paths())
    }

    fn derive_paths(&self) -> Vec<PathBuf> {
        let width = (self.shards - 1).to_string().len();
        let stem = self
            .template
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = self
            .template
            .extension()
            .map(|e| e.to_string_lossy().into_owned());
        let dir = self.template.parent().unwrap_or_else(|| Path::new(""));

        (0..self.shards)
            .map(|index| {
                let name = match &extension {
                    Some(ext) => format!("{stem}{index:0width$}.{ext}"),
                    None => format!("{stem}{index:0width$}"),
                };
                dir.join(name)
            })
            .collect()
    }

    /// Delete the shard files together with their parent directory.
    ///
    /// # Errors
    /// Returns an error if the tree cannot be removed.
    pub fn delete(&self) -> Result<()> {
        match self.template.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => remove_tree(parent),
            _ => {
                for path in self.paths() {
                    if path.exists() {
                        std::fs::remove_file(path)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Routes each record to one of several wrapped writers.
///
/// Composes with the write pipeline: a queue worker's "own writer" may be
/// one of these, giving two-level routing (record to queue group, then to
/// the shard within the group).
pub struct ShardedWriter<T> {
    writers: Vec<BoxWriter<T>>,
    router: ShardRouter,
}

impl<T> ShardedWriter<T> {
    /// Wrap `writers` behind `router`.
    ///
    /// # Errors
    /// Fails unless the router's index space matches the writer count.
    pub fn new(writers: Vec<BoxWriter<T>>, router: ShardRouter) -> Result<Self> {
        if writers.len() != router.shards() as usize {
            bail!(
                "router produces {} indexes but {} writers were supplied",
                router.shards(),
                writers.len()
            );
        }
        Ok(Self { writers, router })
    }
}

impl<T: ShardKey + Send> RecordWriter<T> for ShardedWriter<T> {
    fn write(&mut self, record: T) -> Result<()> {
        let index = self.router.route(&record) as usize;
        self.writers[index].write(record)
    }

    /// Closes every wrapped writer even when an earlier one fails; the first
    /// failure is the one reported.
    fn close(&mut self) -> Result<()> {
        let mut first: Option<Error> = None;
        for writer in &mut self.writers {
            if let Err(err) = writer.close() {
                if first.is_none() {
                    first = Some(err);
                } else {
                    warn!("additional shard writer close failure: {err:#}");
                }
            }
        }
        first.map_or(Ok(()), Err)
    }
}
