//! Sector alignment and calculation utilities

use crate::types::SECTOR_SIZE;

/// Convert sector number to byte offset
///
/// Returns `None` if the byte offset does not fit in 64 bits.
pub fn sector_to_byte(sector: u64) -> Option<u64> {
    sector.checked_mul(SECTOR_SIZE as u64)
}

/// Number of bytes covered by `count` sectors, if addressable in memory
pub fn sectors_to_len(count: u64) -> Option<usize> {
    usize::try_from(sector_to_byte(count)?).ok()
}

/// Check if a byte count is a whole number of sectors
pub fn is_sector_aligned(value: usize) -> bool {
    value % SECTOR_SIZE == 0
}
