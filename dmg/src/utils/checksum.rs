//! Checksum calculations for validation

/// CRC-32 (IEEE) as used by UDIF data fork checksums
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}
