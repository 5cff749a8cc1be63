//! Chunklist header and chunk entries
//!
//! All fields are little-endian.
//!
//! ```text
//! 0   magic         "CNKL"
//! 4   length        header size (36)
//! 8   file_version  1
//! 9   chunk_method  1 (SHA-256)
//! 10  sig_method    1 (RSA-2048)
//! 11  unused
//! 12  chunk_count   u64
//! 20  chunk_offset  u64
//! 28  sig_offset    u64
//! ```

use crate::crypto::SHA256_DIGEST_SIZE;
use crate::error::{Error, Result};
use crate::utils::endian::{read_array, read_le_u32, read_le_u64};

/// Parsed chunklist header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunklistHeader {
    /// Magic, `CNKL` on disk
    pub magic: u32,
    /// Header length in bytes
    pub length: u32,
    /// Format version
    pub file_version: u8,
    /// Chunk hash method
    pub chunk_method: u8,
    /// Signature method
    pub sig_method: u8,
    /// Number of chunk entries
    pub chunk_count: u64,
    /// Offset of the chunk table
    pub chunk_offset: u64,
    /// Offset of the signature
    pub sig_offset: u64,
}

impl ChunklistHeader {
    /// On-disk header size
    pub const SIZE: usize = 36;

    /// Magic value as read little-endian from the bytes `CNKL`
    pub const MAGIC: u32 = u32::from_le_bytes(*b"CNKL");

    /// Only defined value for the version and method fields
    pub const VERSION_1: u8 = 1;

    /// Parse the fixed header fields without validating them
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::InvalidParameter);
        }
        let u32_at = |off| read_le_u32(data, off).ok_or(Error::InvalidParameter);
        let u64_at = |off| read_le_u64(data, off).ok_or(Error::InvalidParameter);

        Ok(Self {
            magic: u32_at(0)?,
            length: u32_at(4)?,
            file_version: data[8],
            chunk_method: data[9],
            sig_method: data[10],
            chunk_count: u64_at(12)?,
            chunk_offset: u64_at(20)?,
            sig_offset: u64_at(28)?,
        })
    }

    /// Check magic, version and method fields
    pub fn validate(&self) -> Result<()> {
        if self.magic != Self::MAGIC {
            log::debug!("Chunklist magic {:#010x} is not CNKL", self.magic);
            return Err(Error::Unsupported);
        }
        if self.length as usize != Self::SIZE {
            log::debug!("Chunklist header length {} unsupported", self.length);
            return Err(Error::Unsupported);
        }
        if self.file_version != Self::VERSION_1
            || self.chunk_method != Self::VERSION_1
            || self.sig_method != Self::VERSION_1
        {
            log::debug!(
                "Chunklist version {} / chunk method {} / signature method {} unsupported",
                self.file_version,
                self.chunk_method,
                self.sig_method
            );
            return Err(Error::Unsupported);
        }
        if self.chunk_count == 0 {
            log::debug!("Chunklist has no chunks");
            return Err(Error::Unsupported);
        }
        Ok(())
    }
}

/// One chunk table entry: a length and the SHA-256 of that many bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkEntry<'a> {
    /// Bytes covered by this chunk
    pub length: u32,
    /// Expected SHA-256 of the chunk
    pub checksum: &'a [u8; SHA256_DIGEST_SIZE],
}

impl<'a> ChunkEntry<'a> {
    /// On-disk entry size
    pub const SIZE: usize = 4 + SHA256_DIGEST_SIZE;

    /// Parse the entry at the start of `data`
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        Some(Self {
            length: read_le_u32(data, 0)?,
            checksum: read_array(data, 4)?,
        })
    }
}
