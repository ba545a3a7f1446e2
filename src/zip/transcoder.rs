//! Streaming ZIP transcoder.
//!
//! Walks the three regions of an archive in on-disk order, copying every field
//! to the output. Only three things change on the way through:
//!
//! - the extra field of stored local entries grows by enough zero bytes to put
//!   the entry data on the alignment boundary
//! - each central directory record gets the new position of its local header
//! - the end record gets the new position of the central directory
//!
//! Regions are discovered by signature alone. Entry counts stored in the end
//! record are copied, never trusted.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::{debug, info};

use super::offsets::{padding_for, to_zip_offset, OffsetTable};
use super::{
    AlignSummary, CENTRAL_DIRECTORY_SIGNATURE, DATA_DESCRIPTOR_SIGNATURE,
    END_OF_CENTRAL_DIRECTORY_SIGNATURE, FLAG_DATA_DESCRIPTOR, LOCAL_FILE_HEADER_SIGNATURE,
    METHOD_STORED, ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE, ZIP64_SIZE_MARKER,
};
use crate::utils::CountingWriter;
use crate::{AlignError, AlignResult};

/// Single-use transcoder over one input stream and one output sink
pub struct Transcoder<R: Read, W: Write> {
    input: R,
    output: CountingWriter<W>,
    alignment: u32,
    offsets: OffsetTable,
    summary: AlignSummary,
}

impl<R: Read, W: Write> Transcoder<R, W> {
    /// Create a transcoder, rejecting a zero alignment before any I/O happens
    pub fn new(input: R, output: W, alignment: u32) -> AlignResult<Self> {
        if alignment == 0 {
            return Err(AlignError::InvalidAlignment(alignment));
        }

        Ok(Self {
            input,
            output: CountingWriter::new(output),
            alignment,
            offsets: OffsetTable::new(),
            summary: AlignSummary::default(),
        })
    }

    /// Run all three passes and return what was done
    pub fn run(mut self) -> AlignResult<AlignSummary> {
        let signature = self.copy_local_entries()?;

        let central_directory_offset = to_zip_offset(self.output.bytes_written())?;
        let signature = self.copy_central_directory(signature)?;
        expect_end_of_central_directory(signature)?;
        self.offsets.finish()?;
        self.copy_end_of_central_directory(central_directory_offset)?;

        self.output.flush()?;
        self.summary.bytes_written = self.output.bytes_written();

        info!(
            entries = self.summary.entries,
            padded = self.summary.padded_entries,
            padding_bytes = self.summary.padding_bytes,
            bytes_written = self.summary.bytes_written,
            alignment = self.alignment,
            "archive realigned"
        );

        Ok(self.summary)
    }

    /// Copy local entries until the next signature is something else, which is
    /// returned to the caller
    fn copy_local_entries(&mut self) -> AlignResult<u32> {
        let mut signature = self.read_u32("record signature")?;

        while signature == LOCAL_FILE_HEADER_SIGNATURE {
            self.copy_local_entry()?;
            signature = self.read_u32("record signature")?;
        }

        Ok(signature)
    }

    fn copy_local_entry(&mut self) -> AlignResult<()> {
        let header_offset = self.output.bytes_written();
        self.offsets.record(header_offset)?;
        self.write_u32(LOCAL_FILE_HEADER_SIGNATURE)?;

        self.pass_u16("version needed to extract")?;
        let flags = self.pass_u16("general purpose flags")?;
        let has_data_descriptor = flags & FLAG_DATA_DESCRIPTOR != 0;

        let method = self.pass_u16("compression method")?;
        let should_align = method == METHOD_STORED;

        self.pass_bytes(8, "modification time, date and crc-32")?;
        let compressed_size = self.pass_u32("compressed size")?;
        self.pass_u32("uncompressed size")?;

        let name_len = self.pass_u16("file name length")?;
        let extra_len = self.read_u16("extra field length")?;

        // +2 for the extra field length itself, which is not written yet
        let data_start =
            self.output.bytes_written() + 2 + u64::from(name_len) + u64::from(extra_len);
        let padding = if should_align {
            padding_for(data_start, self.alignment)
        } else {
            0
        };

        let padded_extra_len = u16::try_from(u64::from(extra_len) + padding).map_err(|_| {
            AlignError::Unsupported(format!(
                "extra field of {} bytes cannot hold {} bytes of padding",
                extra_len, padding
            ))
        })?;
        self.write_u16(padded_extra_len)?;

        let mut name = vec![0u8; usize::from(name_len)];
        self.input
            .read_exact(&mut name)
            .map_err(|e| AlignError::from_read(e, "file name"))?;
        self.output.write_all(&name)?;

        self.pass_bytes(u64::from(extra_len), "extra field")?;
        if padding != 0 {
            io::copy(&mut io::repeat(0).take(padding), &mut self.output)?;
        }

        let data_len = if has_data_descriptor {
            self.copy_until_data_descriptor()?
        } else {
            if compressed_size == ZIP64_SIZE_MARKER {
                return Err(AlignError::Unsupported(format!(
                    "entry {} stores its size in a ZIP64 extra field",
                    String::from_utf8_lossy(&name)
                )));
            }
            self.pass_bytes(u64::from(compressed_size), "entry data")?;
            u64::from(compressed_size)
        };

        self.output.flush()?;

        self.summary.entries += 1;
        if padding != 0 {
            self.summary.padded_entries += 1;
            self.summary.padding_bytes += padding;
        }
        if has_data_descriptor {
            self.summary.streamed_entries += 1;
        }

        debug!(
            name = %String::from_utf8_lossy(&name),
            offset = header_offset,
            method,
            padding,
            data_len,
            streamed = has_data_descriptor,
            "copied local entry"
        );

        Ok(())
    }

    /// Copy the data of a streamed entry up to and including its data
    /// descriptor, returning the number of bytes scanned (descriptor
    /// signature included).
    ///
    /// The end of the data is found by looking for the descriptor signature in
    /// the byte stream. If the payload happens to contain that byte pattern the
    /// scan stops early; descriptors written without a signature are never
    /// found. Both are accepted limitations of the format.
    fn copy_until_data_descriptor(&mut self) -> AlignResult<u64> {
        let mut window = 0u32;
        let mut scanned = 0u64;

        loop {
            let byte = self
                .input
                .read_u8()
                .map_err(|e| AlignError::from_read(e, "streamed entry data"))?;
            self.output.write_u8(byte)?;

            window = (window >> 8) | (u32::from(byte) << 24);
            scanned += 1;

            if scanned >= 4 && window == DATA_DESCRIPTOR_SIGNATURE {
                break;
            }
        }

        // crc-32, compressed size, uncompressed size
        self.pass_bytes(12, "data descriptor")?;

        Ok(scanned)
    }

    /// Rewrite central directory records while the signature matches,
    /// returning the signature that ended the run
    fn copy_central_directory(&mut self, mut signature: u32) -> AlignResult<u32> {
        while signature == CENTRAL_DIRECTORY_SIGNATURE {
            let local_header_offset = self.offsets.next_offset()?;
            self.write_u32(CENTRAL_DIRECTORY_SIGNATURE)?;

            self.pass_bytes(24, "central directory metadata")?;

            let name_len = self.pass_u16("file name length")?;
            let extra_len = self.pass_u16("extra field length")?;
            let comment_len = self.pass_u16("file comment length")?;

            self.pass_bytes(8, "disk number and file attributes")?;

            self.read_u32("local header offset")?;
            self.write_u32(local_header_offset)?;

            let variable_len =
                u64::from(name_len) + u64::from(extra_len) + u64::from(comment_len);
            self.pass_bytes(variable_len, "central directory name, extra field and comment")?;

            self.output.flush()?;
            signature = self.read_u32("record signature")?;
        }

        Ok(signature)
    }

    /// Copy the end record whose signature was already consumed
    fn copy_end_of_central_directory(&mut self, central_directory_offset: u32) -> AlignResult<()> {
        self.write_u32(END_OF_CENTRAL_DIRECTORY_SIGNATURE)?;
        // disk numbers, entry counts and central directory size
        self.pass_bytes(12, "end of central directory record")?;

        self.read_u32("central directory offset")?;
        self.write_u32(central_directory_offset)?;

        let comment_len = self.pass_u16("archive comment length")?;
        self.pass_bytes(u64::from(comment_len), "archive comment")?;

        Ok(())
    }

    fn read_u16(&mut self, context: &'static str) -> AlignResult<u16> {
        self.input
            .read_u16::<LittleEndian>()
            .map_err(|e| AlignError::from_read(e, context))
    }

    fn read_u32(&mut self, context: &'static str) -> AlignResult<u32> {
        self.input
            .read_u32::<LittleEndian>()
            .map_err(|e| AlignError::from_read(e, context))
    }

    fn write_u16(&mut self, value: u16) -> AlignResult<()> {
        self.output.write_u16::<LittleEndian>(value)?;
        Ok(())
    }

    fn write_u32(&mut self, value: u32) -> AlignResult<()> {
        self.output.write_u32::<LittleEndian>(value)?;
        Ok(())
    }

    fn pass_u16(&mut self, context: &'static str) -> AlignResult<u16> {
        let value = self.read_u16(context)?;
        self.write_u16(value)?;
        Ok(value)
    }

    fn pass_u32(&mut self, context: &'static str) -> AlignResult<u32> {
        let value = self.read_u32(context)?;
        self.write_u32(value)?;
        Ok(value)
    }

    /// Copy exactly `len` bytes from input to output
    fn pass_bytes(&mut self, len: u64, context: &'static str) -> AlignResult<()> {
        let copied = io::copy(&mut (&mut self.input).take(len), &mut self.output)?;
        if copied < len {
            return Err(AlignError::Truncated(context));
        }
        Ok(())
    }
}

/// The record after the central directory must be the end record
fn expect_end_of_central_directory(signature: u32) -> AlignResult<()> {
    if signature == ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE {
        return Err(AlignError::Unsupported(
            "ZIP64 end of central directory record".to_string(),
        ));
    }
    if signature != END_OF_CENTRAL_DIRECTORY_SIGNATURE {
        return Err(AlignError::MissingEndOfCentralDirectory { found: signature });
    }
    Ok(())
}
