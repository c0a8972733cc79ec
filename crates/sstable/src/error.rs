use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SegmentError>;

/// Failure modes of segment I/O.
///
/// Not-found is not an error: lookups return `Ok(None)`. Keeping `Io` and
/// `Malformed` as separate variants lets callers tell a failing disk apart
/// from a file that does not follow the format.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed segment: {0}")]
    Malformed(&'static str),
}
