//! Segment binary format constants and record codecs.
//!
//! Two record kinds share a segment file:
//!
//! ```text
//! IndexRecord = key_len(u32) | key | offset(u64)
//! DataRecord  = key_len(u32) | val_len(u32) | key | value
//! ```
//!
//! All integers are big-endian. Length fields count UTF-8 bytes, not
//! characters. The codecs operate on open handles with positional reads;
//! nothing here buffers a whole file.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::error::{Result, SegmentError};

/// Width of a `u32` count/length field.
pub const SIZE_FIELD_BYTES: u64 = 4;

/// Width of a `u64` file-offset field.
pub const OFFSET_FIELD_BYTES: u64 = 8;

/// Every Kth data record is sampled into the sparse index, starting with the
/// first. Fixed at 10; segments written with a different stride are not
/// compatible.
pub const SPARSE_INDEX_SAMPLE_FACTOR: usize = 10;

/// Encoded size of a data record: two length prefixes plus the raw bytes.
pub fn data_record_len(key: &str, value: &str) -> u64 {
    SIZE_FIELD_BYTES * 2 + key.len() as u64 + value.len() as u64
}

/// Encoded size of an index record.
pub fn index_record_len(key: &str) -> u64 {
    SIZE_FIELD_BYTES + key.len() as u64 + OFFSET_FIELD_BYTES
}

pub(crate) fn write_count<W: Write>(w: &mut W, count: u32) -> io::Result<()> {
    w.write_u32::<BigEndian>(count)
}

pub(crate) fn write_index_record<W: Write>(w: &mut W, key: &str, offset: u64) -> io::Result<()> {
    w.write_u32::<BigEndian>(key.len() as u32)?;
    w.write_all(key.as_bytes())?;
    w.write_u64::<BigEndian>(offset)?;
    Ok(())
}

pub(crate) fn write_data_record<W: Write>(w: &mut W, key: &str, value: &str) -> io::Result<()> {
    w.write_u32::<BigEndian>(key.len() as u32)?;
    w.write_u32::<BigEndian>(value.len() as u32)?;
    w.write_all(key.as_bytes())?;
    w.write_all(value.as_bytes())?;
    Ok(())
}

pub(crate) fn read_count<R: Read>(r: &mut R) -> Result<u32> {
    r.read_u32::<BigEndian>().map_err(truncated)
}

pub(crate) fn read_index_record<R: Read>(r: &mut R) -> Result<(String, u64)> {
    let key_len = r.read_u32::<BigEndian>().map_err(truncated)? as usize;
    let key = read_string(r, key_len)?;
    let offset = r.read_u64::<BigEndian>().map_err(truncated)?;
    Ok((key, offset))
}

pub(crate) fn read_data_record<R: Read>(r: &mut R) -> Result<(String, String)> {
    let key_len = r.read_u32::<BigEndian>().map_err(truncated)? as usize;
    let value_len = r.read_u32::<BigEndian>().map_err(truncated)? as usize;
    let key = read_string(r, key_len)?;
    let value = read_string(r, value_len)?;
    Ok((key, value))
}

fn read_string<R: Read>(r: &mut R, len: usize) -> Result<String> {
    // Length fields are untrusted: let the read hit end-of-file rather than
    // pre-allocating whatever the field claims.
    let mut buf = Vec::with_capacity(len.min(64 * 1024));
    r.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() < len {
        return Err(SegmentError::Malformed("record extends past end of file"));
    }
    String::from_utf8(buf).map_err(|_| SegmentError::Malformed("record bytes are not valid UTF-8"))
}

/// A short read behind a size field means the file misstates its own length;
/// any other failure is a real I/O fault.
fn truncated(e: io::Error) -> SegmentError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        SegmentError::Malformed("record extends past end of file")
    } else {
        SegmentError::Io(e)
    }
}
