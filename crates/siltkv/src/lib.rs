//! # SiltKV
//!
//! A small log-structured key-value store. Writes land in an in-memory
//! sorted buffer (the [`memtable::Memtable`]); once the buffer reaches a
//! configurable entry count it is rolled into an immutable, sparse-indexed
//! segment file (`seg-<n>.sst`). Reads consult the buffer first, then the
//! on-disk segments from newest to oldest, so the most recent write for a
//! key always wins. [`Store::merge`] collapses all segments into one,
//! keeping only the newest value per key.
//!
//! The store is single-writer: `put`, `get`, `merge`, and `flush` are
//! mutually exclusive on one instance, serialized by an internal lock held
//! across their I/O. Any thread may call them.
//!
//! ```no_run
//! use siltkv::Store;
//!
//! # fn main() -> anyhow::Result<()> {
//! let store = Store::open("./data")?;
//! store.put("user:1", "ada")?;
//! assert_eq!(store.get("user:1")?, Some("ada".to_string()));
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use memtable::Memtable;
use parking_lot::Mutex;
use sstable::{SSTable, SSTableWriter};
use tracing::{error, info};

pub use sstable::SPARSE_INDEX_SAMPLE_FACTOR;

/// Buffered entry count at which the store rolls the memtable into a new
/// segment, unless overridden in [`StoreConfig`].
pub const DEFAULT_SEGMENT_SIZE_LIMIT: usize = 1024;

const SEGMENT_PREFIX: &str = "seg-";
const SEGMENT_SUFFIX: &str = ".sst";
const MERGE_STAGING_FILE: &str = "tmp.sst";

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory owned by the store; created on open if missing.
    pub data_path: PathBuf,
    /// Buffered entry count at which a flush triggers. Must be positive.
    pub segment_size_limit: usize,
}

impl StoreConfig {
    /// Configuration with the default segment size limit.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            segment_size_limit: DEFAULT_SEGMENT_SIZE_LIMIT,
        }
    }

    /// Overrides the rollover threshold.
    pub fn segment_size_limit(mut self, limit: usize) -> Self {
        self.segment_size_limit = limit;
        self
    }
}

struct Inner {
    memtable: Memtable,
    /// Oldest first; position in the list encodes recency.
    segments: Vec<Arc<SSTable>>,
}

/// A log-structured key-value store over one directory of segment files.
pub struct Store {
    config: StoreConfig,
    inner: Mutex<Inner>,
}

impl Store {
    /// Opens a store on `data_path` with the default configuration.
    pub fn open(data_path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with(StoreConfig::new(data_path))
    }

    /// Opens a store with an explicit configuration.
    ///
    /// Creates the data directory if needed, then loads every file matching
    /// `seg-<n>.sst`, ordered by the numeric suffix, oldest first. A
    /// segment that fails to open fails the whole open; a store must not
    /// silently serve a subset of its data.
    pub fn open_with(config: StoreConfig) -> Result<Self> {
        ensure!(
            config.segment_size_limit > 0,
            "segment_size_limit must be positive"
        );
        fs::create_dir_all(&config.data_path)
            .with_context(|| format!("creating data directory {}", config.data_path.display()))?;

        let mut segments = Vec::new();
        for path in scan_segment_files(&config.data_path)? {
            let segment = match SSTable::open(&path) {
                Ok(segment) => segment,
                Err(e) => {
                    error!(segment = %path.display(), error = %e, "refusing to open store");
                    return Err(e).with_context(|| format!("opening segment {}", path.display()));
                }
            };
            segments.push(Arc::new(segment));
        }
        info!(
            path = %config.data_path.display(),
            segments = segments.len(),
            "opened store"
        );

        Ok(Self {
            config,
            inner: Mutex::new(Inner {
                memtable: Memtable::new(),
                segments,
            }),
        })
    }

    /// Inserts or overwrites a key.
    ///
    /// When the buffer reaches the configured size limit, it is rolled into
    /// a new segment file as part of this call.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.memtable.put(key.into(), value.into());
        if inner.memtable.len() >= self.config.segment_size_limit {
            self.roll_segment(&mut inner)?;
        }
        Ok(())
    }

    /// Point lookup.
    ///
    /// The buffer shadows every segment; segments are consulted newest to
    /// oldest. `Ok(None)` means the key has never been written.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let inner = self.inner.lock();
        if let Some(value) = inner.memtable.get(key) {
            return Ok(Some(value.to_string()));
        }
        for segment in inner.segments.iter().rev() {
            if let Some(value) = segment.get(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Collapses all on-disk segments into a single `seg-1.sst`, keeping the
    /// newest value for every key.
    ///
    /// The buffer is untouched and continues to shadow the merged segment.
    /// No-op when there are no segments. Not crash-safe: a crash between
    /// deleting the old segment files and renaming the staging file in can
    /// lose the merged data.
    pub fn merge(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.segments.is_empty() {
            return Ok(());
        }

        // Newest first, so the first occurrence of a key is the newest one.
        let mut seen = HashSet::new();
        let mut merged = Memtable::new();
        for segment in inner.segments.iter().rev() {
            for record in segment.iter()? {
                let (key, value) = record?;
                if seen.insert(key.clone()) {
                    merged.put(key, value);
                }
            }
        }

        let staging = self.config.data_path.join(MERGE_STAGING_FILE);
        SSTableWriter::write_from_memtable(&staging, &merged)
            .with_context(|| format!("writing merged segment {}", staging.display()))?;

        let merged_count = inner.segments.len();
        for segment in &inner.segments {
            fs::remove_file(segment.path())
                .with_context(|| format!("removing segment {}", segment.path().display()))?;
        }
        let target = self.segment_path(1);
        fs::rename(&staging, &target)
            .with_context(|| format!("renaming {} into place", staging.display()))?;

        let segment = SSTable::open(&target)
            .with_context(|| format!("reopening merged segment {}", target.display()))?;
        inner.segments.clear();
        inner.segments.push(Arc::new(segment));
        info!(
            merged = merged_count,
            entries = merged.len(),
            "compacted segments"
        );
        Ok(())
    }

    /// Rolls a non-empty buffer to disk as a new segment, regardless of the
    /// size limit.
    ///
    /// There is no write-ahead log, so buffered entries live only in memory
    /// until a rollover; call this before dropping the store to make the
    /// tail of the write sequence durable. No-op when the buffer is empty.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.memtable.is_empty() {
            return Ok(());
        }
        self.roll_segment(&mut inner)
    }

    /// Snapshot of the on-disk segment list, oldest first.
    pub fn segments(&self) -> Vec<Arc<SSTable>> {
        self.inner.lock().segments.clone()
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn roll_segment(&self, inner: &mut Inner) -> Result<()> {
        let path = self.segment_path(inner.segments.len() as u64 + 1);
        let segment = SSTableWriter::write_from_memtable(&path, &inner.memtable)
            .with_context(|| format!("flushing memtable to {}", path.display()))?;
        info!(
            segment = %path.display(),
            entries = inner.memtable.len(),
            "rolled memtable into segment"
        );
        inner.segments.push(Arc::new(segment));
        inner.memtable = Memtable::new();
        Ok(())
    }

    fn segment_path(&self, n: u64) -> PathBuf {
        self.config
            .data_path
            .join(format!("{}{}{}", SEGMENT_PREFIX, n, SEGMENT_SUFFIX))
    }
}

fn scan_segment_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found: Vec<(u64, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(n) = parse_segment_number(name) {
            found.push((n, entry.path()));
        }
    }
    found.sort_by_key(|(n, _)| *n);
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

/// Extracts `n` from `seg-<n>.sst`; anything else is not a segment file.
fn parse_segment_number(name: &str) -> Option<u64> {
    let digits = name
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
