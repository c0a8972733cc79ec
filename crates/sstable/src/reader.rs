use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use crate::error::{Result, SegmentError};
use crate::format::{self, SIZE_FIELD_BYTES};

/// An immutable, sorted, sparse-indexed segment file opened for reads.
///
/// On [`open`](SSTable::open) the **sparse index** (one entry per sampled
/// data record) is loaded into memory as a `BTreeMap<String, u64>` mapping
/// each sampled key to the absolute byte offset of its data record. A point
/// lookup either hits a sampled key directly (one seek + one record decode)
/// or linearly scans the bracket between the two neighboring samples.
///
/// The data file is **not** kept open between lookups: each
/// [`get`](SSTable::get) and each [`iter`](SSTable::iter) opens its own
/// handle, so lookups and iteration over the same segment never contend.
#[derive(Debug)]
pub struct SSTable {
    /// Path to the `.sst` file on disk.
    path: PathBuf,
    /// Total file size in bytes; the data section runs to the end.
    file_size: u64,
    /// Sampled key → absolute offset of that key's data record.
    index: BTreeMap<String, u64>,
    /// Absolute offset of the data-section header (`data_count`).
    data_section_offset: u64,
}

impl SSTable {
    /// Opens a segment file and loads its sparse index into memory.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::Malformed`] if the header or an index record
    /// is inconsistent with the format (truncated fields, non-UTF-8 keys,
    /// offsets past end-of-file), and [`SegmentError::Io`] on any other I/O
    /// failure.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let mut f = File::open(&path_buf)?;
        let file_size = f.metadata()?.len();

        let index_count = format::read_count(&mut f)?;
        let mut index = BTreeMap::new();
        for _ in 0..index_count {
            let (key, offset) = format::read_index_record(&mut f)?;
            if offset >= file_size {
                return Err(SegmentError::Malformed("index offset past end of file"));
            }
            index.insert(key, offset);
        }

        // The cursor now sits on the data_count header.
        let data_section_offset = f.stream_position()?;
        if data_section_offset + SIZE_FIELD_BYTES > file_size {
            return Err(SegmentError::Malformed("missing data section header"));
        }

        Ok(Self {
            path: path_buf,
            file_size,
            index,
            data_section_offset,
        })
    }

    /// Point lookup for a single key.
    ///
    /// Returns `Ok(None)` for keys this segment does not hold; errors are
    /// reserved for I/O faults and format violations.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        // Sampled keys resolve with a single seek.
        if let Some(&offset) = self.index.get(key) {
            let mut f = File::open(&self.path)?;
            f.seek(SeekFrom::Start(offset))?;
            let (stored, value) = format::read_data_record(&mut f)?;
            if stored != key {
                return Err(SegmentError::Malformed("index offset points at a different key"));
            }
            return Ok(Some(value));
        }

        let floor = self
            .index
            .range::<str, _>((Bound::Unbounded, Bound::Included(key)))
            .next_back();
        let ceiling = self
            .index
            .range::<str, _>((Bound::Included(key), Bound::Unbounded))
            .next();
        if floor.is_none() && ceiling.is_none() {
            return Ok(None);
        }

        let from = match floor {
            Some((_, &offset)) => offset,
            None => self.first_record_offset(),
        };
        let to = match ceiling {
            Some((_, &offset)) => offset,
            None => self.file_size,
        };
        self.scan_window(key, from, to)
    }

    /// Linear scan of the bracket between two sampled records.
    ///
    /// The upper bound is inclusive: the record starting exactly at `to` is
    /// still decoded.
    fn scan_window(&self, key: &str, from: u64, to: u64) -> Result<Option<String>> {
        let mut f = File::open(&self.path)?;
        f.seek(SeekFrom::Start(from))?;
        let mut pos = from;
        while pos <= to && pos < self.file_size {
            let (record_key, value) = format::read_data_record(&mut f)?;
            if record_key == key {
                return Ok(Some(value));
            }
            // Data records are sorted; once past the key it cannot appear.
            if record_key.as_str() > key {
                return Ok(None);
            }
            pos = f.stream_position()?;
        }
        Ok(None)
    }

    /// Returns a forward iterator over all data records in ascending key
    /// order.
    ///
    /// The iterator owns an independent file handle, so it can run
    /// concurrently with point lookups against the same segment. The handle
    /// is released when the iterator is dropped.
    pub fn iter(&self) -> Result<SegmentIter> {
        let start = self.first_record_offset();
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(start))?;
        Ok(SegmentIter {
            file,
            pos: start,
            file_size: self.file_size,
        })
    }

    /// Absolute offset of the first data record, just past `data_count`.
    fn first_record_offset(&self) -> u64 {
        self.data_section_offset + SIZE_FIELD_BYTES
    }

    /// Path to the segment file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Returns the sampled keys in ascending order.
    ///
    /// Useful for debugging and for tests that check index consistency.
    pub fn sampled_keys(&self) -> impl Iterator<Item = &String> {
        self.index.keys()
    }
}

/// Lazy forward iterator over a segment's data records.
///
/// Yields `(key, value)` pairs in file order, which is ascending key order.
/// Segment files carry no trailing bytes, so end-of-data is exactly
/// end-of-file. A decode error is yielded once and ends the iteration.
pub struct SegmentIter {
    file: File,
    pos: u64,
    file_size: u64,
}

impl Iterator for SegmentIter {
    type Item = Result<(String, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.file_size {
            return None;
        }
        let record = format::read_data_record(&mut self.file).and_then(|pair| {
            self.pos = self.file.stream_position()?;
            Ok(pair)
        });
        if record.is_err() {
            self.pos = self.file_size;
        }
        Some(record)
    }
}
