//! Alignment verification of finished archives

use std::io::{Read, Seek};

use tracing::debug;
use zip::{CompressionMethod, ZipArchive};

use crate::utils::calculate_crc32;
use crate::{AlignError, AlignResult};

/// Outcome for a single entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Stored entry whose data starts on the boundary
    Aligned,
    /// Compressed entry, alignment does not apply
    Compressed,
    /// Stored entry whose data start leaves this remainder
    Misaligned(u64),
    /// Stored entry whose payload no longer matches its CRC-32
    Corrupt { expected: u32, actual: u32 },
}

/// Per-entry line of an [`AlignmentReport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryAlignment {
    pub name: String,
    pub data_start: u64,
    pub status: EntryStatus,
}

/// Result of checking every entry of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentReport {
    pub alignment: u32,
    pub entries: Vec<EntryAlignment>,
}

impl AlignmentReport {
    /// True when no stored entry is misaligned or corrupt
    pub fn is_aligned(&self) -> bool {
        self.entries
            .iter()
            .all(|e| matches!(e.status, EntryStatus::Aligned | EntryStatus::Compressed))
    }

    /// Entries that failed the check
    pub fn failures(&self) -> impl Iterator<Item = &EntryAlignment> {
        self.entries
            .iter()
            .filter(|e| !matches!(e.status, EntryStatus::Aligned | EntryStatus::Compressed))
    }
}

/// Check that every stored entry of the archive starts on `alignment`
pub fn check_alignment<R: Read + Seek>(reader: R, alignment: u32) -> AlignResult<AlignmentReport> {
    if alignment == 0 {
        return Err(AlignError::InvalidAlignment(alignment));
    }

    let mut archive = ZipArchive::new(reader)?;
    let mut entries = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        // Raw access skips decompression and the reader's own CRC check, so a
        // bad payload is reported per entry instead of failing the whole check
        let mut file = archive.by_index_raw(i)?;
        let name = file.name().to_string();
        let data_start = file.data_start();

        let status = if file.compression() != CompressionMethod::Stored {
            EntryStatus::Compressed
        } else if data_start % u64::from(alignment) != 0 {
            EntryStatus::Misaligned(data_start % u64::from(alignment))
        } else {
            let expected = file.crc32();
            let mut data = Vec::with_capacity(file.compressed_size() as usize);
            file.read_to_end(&mut data)?;
            let actual = calculate_crc32(&data);
            if actual == expected {
                EntryStatus::Aligned
            } else {
                EntryStatus::Corrupt { expected, actual }
            }
        };

        debug!(name = %name, data_start, ?status, "checked entry");
        entries.push(EntryAlignment { name, data_start, status });
    }

    Ok(AlignmentReport { alignment, entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align_zip;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn sample_zip() -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        writer.start_file("a.txt", stored).unwrap();
        writer.write_all(b"stored payload").unwrap();
        writer.start_file("b.txt", deflated).unwrap();
        writer.write_all(b"compressed payload compressed payload").unwrap();
        writer.start_file("res/c.png", stored).unwrap();
        writer.write_all(&[0x89, b'P', b'N', b'G']).unwrap();

        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_unaligned_archive_reported() {
        let report = check_alignment(Cursor::new(sample_zip()), 4096).unwrap();

        assert!(!report.is_aligned());
        assert_eq!(report.entries.len(), 3);
        assert!(matches!(report.entries[0].status, EntryStatus::Misaligned(_)));
        assert_eq!(report.entries[1].status, EntryStatus::Compressed);
        assert_eq!(report.failures().count(), 2);
    }

    #[test]
    fn test_aligned_archive_passes() {
        let mut aligned = Vec::new();
        align_zip(sample_zip().as_slice(), &mut aligned, 4096).unwrap();

        let report = check_alignment(Cursor::new(aligned), 4096).unwrap();
        assert!(report.is_aligned(), "{:?}", report);
        assert_eq!(report.entries[0].name, "a.txt");
        assert_eq!(report.entries[0].data_start % 4096, 0);
        assert_eq!(report.entries[2].status, EntryStatus::Aligned);
    }

    #[test]
    fn test_corrupt_stored_payload_reported() {
        let mut aligned = Vec::new();
        align_zip(sample_zip().as_slice(), &mut aligned, 4).unwrap();

        let report = check_alignment(Cursor::new(aligned.clone()), 4).unwrap();
        let start = report.entries[0].data_start as usize;
        aligned[start] ^= 0xFF;

        let report = check_alignment(Cursor::new(aligned), 4).unwrap();
        assert!(!report.is_aligned());
        assert!(matches!(report.entries[0].status, EntryStatus::Corrupt { .. }));
    }

    #[test]
    fn test_zero_alignment_rejected() {
        assert!(matches!(
            check_alignment(Cursor::new(sample_zip()), 0),
            Err(AlignError::InvalidAlignment(0))
        ));
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            check_alignment(Cursor::new(b"definitely not a zip".to_vec()), 4),
            Err(AlignError::Zip(_))
        ));
    }
}
