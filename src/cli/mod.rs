//! File-level operations behind the `zipalign` binary

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::check::{check_alignment, AlignmentReport, EntryStatus};
use crate::zip::{align_zip, AlignSummary};
use crate::{AlignError, AlignResult};

/// Align `input` into `output`.
///
/// The archive is written to a temporary file next to `output` and only moved
/// into place once alignment succeeded, so a failed run leaves nothing behind.
/// An existing `output` is replaced only when `force` is set.
pub fn align_file(
    input: &Path,
    output: &Path,
    alignment: u32,
    force: bool,
) -> AlignResult<AlignSummary> {
    if !input.exists() {
        return Err(AlignError::InvalidInput(format!(
            "Input file doesn't exist: {}",
            input.display()
        )));
    }
    if !input.is_file() {
        return Err(AlignError::InvalidInput(format!(
            "Input path must be of a file: {}",
            input.display()
        )));
    }
    if output.exists() {
        if same_file(input, output)? {
            return Err(AlignError::InvalidInput(
                "Input and output can't be the same file".to_string(),
            ));
        }
        if !force {
            return Err(AlignError::InvalidInput(format!(
                "Output file already exists: {}",
                output.display()
            )));
        }
    }

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    debug!(temp = %temp.path().display(), "writing aligned archive");

    let summary = align_zip(File::open(input)?, temp.as_file_mut(), alignment)?;
    temp.as_file().sync_all()?;
    temp.persist(output).map_err(|e| AlignError::Io(e.error))?;

    Ok(summary)
}

/// Check the alignment of every stored entry in `input`
pub fn check_file(input: &Path, alignment: u32) -> AlignResult<AlignmentReport> {
    let file = File::open(input)?;
    check_alignment(BufReader::new(file), alignment)
}

/// One line of verbose check output, in the format `zipalign -c -v` uses
pub fn describe_entry(data_start: u64, name: &str, status: &EntryStatus) -> String {
    match status {
        EntryStatus::Aligned => format!("{:8} {} (OK)", data_start, name),
        EntryStatus::Compressed => format!("{:8} {} (OK - compressed)", data_start, name),
        EntryStatus::Misaligned(rem) => format!("{:8} {} (BAD - {})", data_start, name, rem),
        EntryStatus::Corrupt { expected, actual } => format!(
            "{:8} {} (BAD - crc {:08x} != {:08x})",
            data_start, name, actual, expected
        ),
    }
}

fn same_file(a: &Path, b: &Path) -> AlignResult<bool> {
    Ok(a.canonicalize()? == b.canonicalize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn write_test_zip(path: &Path) {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        writer.start_file("assets/x.txt", options).unwrap();
        writer.write_all(b"payload").unwrap();
        fs::write(path, writer.finish().unwrap().into_inner()).unwrap();
    }

    #[test]
    fn test_align_file_then_check() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.zip");
        let output = dir.path().join("out.zip");
        write_test_zip(&input);

        let summary = align_file(&input, &output, 16, false).unwrap();
        assert_eq!(summary.entries, 1);
        assert_eq!(fs::metadata(&output).unwrap().len(), summary.bytes_written);

        let report = check_file(&output, 16).unwrap();
        assert!(report.is_aligned());
    }

    #[test]
    fn test_existing_output_needs_force() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.zip");
        let output = dir.path().join("out.zip");
        write_test_zip(&input);
        fs::write(&output, b"old").unwrap();

        assert!(matches!(
            align_file(&input, &output, 4, false),
            Err(AlignError::InvalidInput(_))
        ));
        assert_eq!(fs::read(&output).unwrap(), b"old");

        align_file(&input, &output, 4, true).unwrap();
        assert!(check_file(&output, 4).unwrap().is_aligned());
    }

    #[test]
    fn test_missing_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("nope.zip");
        let result = align_file(&input, &dir.path().join("out.zip"), 4, false);
        assert!(matches!(result, Err(AlignError::InvalidInput(_))));
    }

    #[test]
    fn test_input_is_directory() {
        let dir = TempDir::new().unwrap();
        let result = align_file(dir.path(), &dir.path().join("out.zip"), 4, false);
        assert!(matches!(result, Err(AlignError::InvalidInput(_))));
    }

    #[test]
    fn test_same_input_and_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.zip");
        write_test_zip(&input);

        let result = align_file(&input, &input, 4, true);
        assert!(matches!(result, Err(AlignError::InvalidInput(_))));
    }

    #[test]
    fn test_failed_alignment_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.zip");
        let output = dir.path().join("out.zip");
        fs::write(&input, b"PK\x03\x04 truncated").unwrap();

        assert!(matches!(
            align_file(&input, &output, 4, false),
            Err(AlignError::Truncated(_))
        ));
        assert!(!output.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_describe_entry() {
        assert_eq!(describe_entry(36, "a.txt", &EntryStatus::Aligned), "      36 a.txt (OK)");
        assert_eq!(
            describe_entry(41, "b", &EntryStatus::Compressed),
            "      41 b (OK - compressed)"
        );
        assert_eq!(describe_entry(35, "c", &EntryStatus::Misaligned(3)), "      35 c (BAD - 3)");
    }
}
