//! ZIP archive realignment
//!
//! A ZIP file is laid out as:
//! 1. Local file headers, each followed by the entry data (and, for streamed
//!    entries, a data descriptor)
//! 2. The central directory, one record per entry
//! 3. The end of central directory (EOCD) record, with an optional comment
//!
//! [`align_zip`] reads these regions front to back and writes them out again,
//! padding the extra field of every stored entry so its data starts on the
//! requested boundary. ZIP64 archives are not supported.

pub mod offsets;
mod transcoder;

use std::io::{BufReader, BufWriter, Read, Write};

use crate::AlignResult;
use transcoder::Transcoder;

/// Local file header signature (PK\x03\x04)
pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034B50;
/// Data descriptor signature (PK\x07\x08)
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074B50;
/// Central directory file header signature (PK\x01\x02)
pub const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014B50;
/// End of central directory signature (PK\x05\x06)
pub const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06054B50;
/// ZIP64 end of central directory signature (PK\x06\x06)
pub const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06064B50;

/// General purpose flag bit 3: sizes and crc follow the data
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
/// Compression method of stored (uncompressed) entries
pub const METHOD_STORED: u16 = 0;
/// Size value that defers to the ZIP64 extra field
pub const ZIP64_SIZE_MARKER: u32 = 0xFFFF_FFFF;

/// Alignment used by `zipalign` when none is given
pub const DEFAULT_ALIGNMENT: u32 = 4;

/// What a successful alignment pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignSummary {
    /// Local entries copied
    pub entries: usize,
    /// Stored entries that needed padding
    pub padded_entries: usize,
    /// Zero bytes added across all extra fields
    pub padding_bytes: u64,
    /// Entries whose sizes were carried in a data descriptor
    pub streamed_entries: usize,
    /// Size of the output archive
    pub bytes_written: u64,
}

/// Realign the archive read from `input` and write it to `output`.
///
/// The input is assumed to be a well formed archive and is not validated up
/// front; any structural problem found mid-stream aborts with an error and
/// leaves `output` partially written. Callers that need all-or-nothing output
/// should write to a temporary file and rename it on success.
pub fn align_zip<R: Read, W: Write>(
    input: R,
    output: W,
    alignment: u32,
) -> AlignResult<AlignSummary> {
    Transcoder::new(BufReader::new(input), BufWriter::new(output), alignment)?.run()
}

/// [`align_zip`] with the default 4 byte alignment
pub fn align_zip_default<R: Read, W: Write>(
    input: R,
    output: W,
) -> AlignResult<AlignSummary> {
    align_zip(input, output, DEFAULT_ALIGNMENT)
}
