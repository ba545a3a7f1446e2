//! Output offset bookkeeping for the local-entry and central-directory passes

use crate::{AlignError, AlignResult};

/// Number of zero bytes needed to move `position` onto the next multiple of
/// `alignment` (0 when already aligned)
pub fn padding_for(position: u64, alignment: u32) -> u64 {
    let alignment = u64::from(alignment);
    (alignment - position % alignment) % alignment
}

/// Narrow an output position to the 32-bit field ZIP stores it in
pub fn to_zip_offset(position: u64) -> AlignResult<u32> {
    u32::try_from(position).map_err(|_| {
        AlignError::Unsupported(format!(
            "output offset {} needs ZIP64",
            position
        ))
    })
}

/// Local header positions in the output, in local-entry order.
///
/// Filled by the local-entries pass and drained front to back by the central
/// directory pass; records are matched to entries purely by order.
#[derive(Debug, Default)]
pub struct OffsetTable {
    offsets: Vec<u32>,
    consumed: usize,
}

impl OffsetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the output position of a local file header signature
    pub fn record(&mut self, position: u64) -> AlignResult<()> {
        self.offsets.push(to_zip_offset(position)?);
        Ok(())
    }

    /// Take the offset for the next central directory record
    pub fn next_offset(&mut self) -> AlignResult<u32> {
        let offset = self.offsets.get(self.consumed).copied().ok_or(
            AlignError::OffsetCountMismatch {
                offsets: self.offsets.len(),
                records: self.consumed + 1,
            },
        )?;
        self.consumed += 1;
        Ok(offset)
    }

    /// Fail unless every recorded offset was consumed by a central record
    pub fn finish(&self) -> AlignResult<()> {
        if self.consumed != self.offsets.len() {
            return Err(AlignError::OffsetCountMismatch {
                offsets: self.offsets.len(),
                records: self.consumed,
            });
        }
        Ok(())
    }
}
