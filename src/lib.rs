//! # zipalign
//!
//! This library re-writes ZIP archives so that the data of every stored
//! (uncompressed) entry begins on an N-byte boundary, the way Android's
//! `zipalign` does for APKs.
//!
//! The core is a single streaming pass over the archive: local entries are
//! copied with extra padding inserted into their extra field, then the central
//! directory and end-of-central-directory record are copied with their offset
//! fields rewritten to match the new layout.

// Public API exports
pub mod check;
pub mod cli;
pub mod utils;
pub mod zip;

pub use crate::check::{check_alignment, AlignmentReport, EntryAlignment, EntryStatus};
pub use crate::zip::{align_zip, align_zip_default, AlignSummary, DEFAULT_ALIGNMENT};

/// Result type alias for alignment operations
pub type AlignResult<T> = Result<T, AlignError>;

/// Error type shared by the transcoder and the alignment checker
#[derive(Debug, thiserror::Error)]
pub enum AlignError {
    #[error("Truncated input while reading {0}")]
    Truncated(&'static str),

    #[error("No end of central directory record, found signature {found:#010x}")]
    MissingEndOfCentralDirectory { found: u32 },

    #[error("Found {records} central directory records for {offsets} local entries")]
    OffsetCountMismatch { offsets: usize, records: usize },

    #[error("Alignment must be a positive integer, got {0}")]
    InvalidAlignment(u32),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported archive: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] ::zip::result::ZipError),
}

impl AlignError {
    /// Map an I/O error raised while reading `context`, turning an early EOF
    /// into [`AlignError::Truncated`]
    pub fn from_read(err: std::io::Error, context: &'static str) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            AlignError::Truncated(context)
        } else {
            AlignError::Io(err)
        }
    }
}
