//! # SSTable — Sorted String Table
//!
//! Immutable, on-disk segment files for the SiltKV storage engine.
//!
//! When the in-memory [`memtable::Memtable`] reaches the store's size limit
//! it is flushed to disk as a segment. Segments are **write-once,
//! read-many** — once created they are never modified, only replaced during
//! merge.
//!
//! ## File layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │ INDEX SECTION (sparse: every 10th key)          │
//! │                                                 │
//! │ index_count (u32)                               │
//! │ key_len (u32) | key | offset (u64)              │
//! │ ... repeated index_count times ...              │
//! ├─────────────────────────────────────────────────┤
//! │ DATA SECTION (all records, sorted by key)       │
//! │                                                 │
//! │ data_count (u32)                                │
//! │ key_len (u32) | val_len (u32) | key | value     │
//! │ ... repeated data_count times ...               │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! All integers are big-endian; keys and values are UTF-8 and sort byte-wise.
//! Each index offset is the absolute file position of the sampled key's data
//! record, so a point lookup seeks straight there, or scans the bracket
//! between the two neighboring samples when the key was not sampled.

mod error;
mod format;
mod reader;
mod writer;

pub use error::{Result, SegmentError};
pub use format::{
    data_record_len, index_record_len, OFFSET_FIELD_BYTES, SIZE_FIELD_BYTES,
    SPARSE_INDEX_SAMPLE_FACTOR,
};
pub use reader::{SSTable, SegmentIter};
pub use writer::SSTableWriter;
