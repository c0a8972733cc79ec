use std::fs::{rename, OpenOptions};
use std::io::Write;
use std::path::Path;

use memtable::Memtable;

use crate::error::Result;
use crate::format::{self, SIZE_FIELD_BYTES, SPARSE_INDEX_SAMPLE_FACTOR};
use crate::reader::SSTable;

/// Writes a [`Memtable`] to disk as an immutable segment file.
///
/// The writer is stateless; all work happens inside the single static
/// method [`write_from_memtable`](SSTableWriter::write_from_memtable). The
/// write is crash-safe: data is first written to a temporary sibling file,
/// fsynced, and then atomically renamed to the final path.
pub struct SSTableWriter {}

impl SSTableWriter {
    /// Flushes `mem` to a new segment file at `path` and opens it for reads.
    ///
    /// # File layout
    ///
    /// ```text
    /// [INDEX] index_count(u32), then per sample: key_len(u32) | key | offset(u64)
    /// [DATA]  data_count(u32),  then per entry:  key_len(u32) | val_len(u32) | key | val
    /// ```
    ///
    /// All integers big-endian. Every 10th entry of the sorted memtable,
    /// starting with the first, is sampled into the index; each stored
    /// offset is the absolute file position of that entry's data record.
    ///
    /// # Crash safety
    ///
    /// Writes to `<path>.tmp`, calls `sync_all()`, then atomically renames.
    /// If the process dies mid-write the temp file is left behind; the store
    /// ignores it when scanning its directory.
    ///
    /// # Errors
    ///
    /// Any I/O failure. An empty memtable produces a valid empty segment;
    /// callers that do not want zero-entry files on disk must check first.
    pub fn write_from_memtable(path: &Path, mem: &Memtable) -> Result<SSTable> {
        // Single pass over the sorted entries: data-local offset of every
        // sampled record, i.e. the summed encoded size of all records before
        // it within the data section.
        let mut samples: Vec<(&str, u64)> = Vec::new();
        let mut local_offset = 0u64;
        for (i, (key, value)) in mem.iter().enumerate() {
            if i % SPARSE_INDEX_SAMPLE_FACTOR == 0 {
                samples.push((key, local_offset));
            }
            local_offset += format::data_record_len(key, value);
        }

        // Rebase sampled offsets to absolute file positions: past the index
        // section (count + records) and the data_count header.
        let index_section_size: u64 = SIZE_FIELD_BYTES
            + samples
                .iter()
                .map(|(key, _)| format::index_record_len(key))
                .sum::<u64>();
        let data_start = index_section_size + SIZE_FIELD_BYTES;

        let tmp_path = path.with_extension("sst.tmp");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        format::write_count(&mut file, samples.len() as u32)?;
        for (key, local_offset) in &samples {
            format::write_index_record(&mut file, key, data_start + local_offset)?;
        }

        format::write_count(&mut file, mem.len() as u32)?;
        for (key, value) in mem.iter() {
            format::write_data_record(&mut file, key, value)?;
        }

        file.flush()?;
        file.sync_all()?;
        rename(tmp_path, path)?;

        SSTable::open(path)
    }
}
