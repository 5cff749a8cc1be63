//! Block tables (`mish` blobs)
//!
//! Each `blkx` entry of the property list carries one big-endian block table
//! describing a run of image sectors and the chunks that store them.
//!
//! ```text
//! 0    signature          "mish"
//! 4    version
//! 8    sector_number      u64, first image sector
//! 16   sector_count       u64
//! 24   data_offset        u64, base for chunk offsets
//! 32   buffers_needed
//! 36   block_descriptors
//! 40   reserved (24)
//! 64   checksum           136 bytes
//! 200  chunk_count
//! 204  chunks             40 bytes each
//! ```

use alloc::vec::Vec;

use super::trailer::parse_checksum;
use crate::error::{Error, Result};
use crate::types::{Checksum, ChunkType, BLOCK_SIGNATURE, CHECKSUM_WORDS};
use crate::utils::endian::{read_be_u32, read_be_u64};

/// One chunk of a block table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Storage method
    pub kind: ChunkType,
    /// Free-form comment field
    pub comment: u32,
    /// First sector, relative to the owning block
    pub sector_number: u64,
    /// Sectors covered
    pub sector_count: u64,
    /// Payload offset, relative to the block's data offset
    pub compressed_offset: u64,
    /// Payload length
    pub compressed_length: u64,
}

impl Chunk {
    /// On-disk size of a chunk entry
    pub const SIZE: usize = 40;

    fn parse(data: &[u8]) -> Option<Self> {
        Some(Self {
            kind: ChunkType::from_raw(read_be_u32(data, 0)?),
            comment: read_be_u32(data, 4)?,
            sector_number: read_be_u64(data, 8)?,
            sector_count: read_be_u64(data, 16)?,
            compressed_offset: read_be_u64(data, 24)?,
            compressed_length: read_be_u64(data, 32)?,
        })
    }
}

/// Parsed block table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockData {
    /// `mish`
    pub signature: u32,
    /// Table version
    pub version: u32,
    /// First image sector covered
    pub sector_number: u64,
    /// Sectors covered
    pub sector_count: u64,
    /// Base offset added to every chunk's compressed offset
    pub data_offset: u64,
    /// Decompression buffers the writer suggested
    pub buffers_needed: u32,
    /// Descriptor index
    pub block_descriptors: u32,
    /// Checksum over the decoded block
    pub checksum: Checksum,
    /// Chunk entries in table order
    pub chunks: Vec<Chunk>,
}

/// Image-wide limits every block must respect
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockLimits {
    /// Sectors in the image
    pub sector_count: u64,
    /// Byte offset of the data fork
    pub data_fork_offset: u64,
    /// Byte offset one past the end of the data fork
    pub data_fork_end: u64,
}

impl BlockData {
    /// Size of the fixed header before the chunk entries
    pub const HEADER_SIZE: usize = 204;

    /// Parse and validate a block table
    pub(crate) fn parse(data: &[u8], limits: BlockLimits) -> Result<Self> {
        if data.len() < Self::HEADER_SIZE {
            log::debug!("Block table of {} bytes is too short", data.len());
            return Err(Error::EndOfFile);
        }
        let u32_at = |off| read_be_u32(data, off).ok_or(Error::EndOfFile);
        let u64_at = |off| read_be_u64(data, off).ok_or(Error::EndOfFile);

        let signature = u32_at(0)?;
        if signature != BLOCK_SIGNATURE {
            log::debug!("Block signature {:#010x} is not mish", signature);
            return Err(Error::Unsupported);
        }

        let chunk_count = u32_at(200)? as usize;
        let table_len = chunk_count
            .checked_mul(Chunk::SIZE)
            .ok_or(Error::InvalidParameter)?;
        if table_len > data.len() - Self::HEADER_SIZE {
            log::debug!(
                "Block table declares {} chunks but holds {} bytes",
                chunk_count,
                data.len()
            );
            return Err(Error::EndOfFile);
        }

        let checksum = parse_checksum(data, 64).ok_or(Error::EndOfFile)?;
        if checksum.size as usize > CHECKSUM_WORDS * 32 {
            return Err(Error::InvalidParameter);
        }

        let mut block = Self {
            signature,
            version: u32_at(4)?,
            sector_number: u64_at(8)?,
            sector_count: u64_at(16)?,
            data_offset: u64_at(24)?,
            buffers_needed: u32_at(32)?,
            block_descriptors: u32_at(36)?,
            checksum,
            chunks: Vec::new(),
        };

        // Chunk offsets are relative to a base no later than the data fork
        if block.data_offset > limits.data_fork_offset {
            log::warn!(
                "Block data offset {:#x} is past the data fork at {:#x}",
                block.data_offset,
                limits.data_fork_offset
            );
            return Err(Error::CompromisedData);
        }

        let block_end = block
            .sector_number
            .checked_add(block.sector_count)
            .filter(|&end| end <= limits.sector_count)
            .ok_or_else(|| {
                log::debug!(
                    "Block sectors {}+{} exceed image of {} sectors",
                    block.sector_number,
                    block.sector_count,
                    limits.sector_count
                );
                Error::InvalidParameter
            })?;
        block.chunks.try_reserve_exact(chunk_count)?;
        let table = &data[Self::HEADER_SIZE..Self::HEADER_SIZE + table_len];
        for raw in table.chunks_exact(Chunk::SIZE) {
            let chunk = Chunk::parse(raw).ok_or(Error::EndOfFile)?;
            block.check_chunk(&chunk, block_end, limits)?;
            block.chunks.push(chunk);
        }

        Ok(block)
    }

    fn check_chunk(&self, chunk: &Chunk, block_end: u64, limits: BlockLimits) -> Result<()> {
        let sectors_ok = chunk
            .sector_number
            .checked_add(chunk.sector_count)
            .and_then(|end| end.checked_add(self.sector_number))
            .is_some_and(|end| end <= block_end);
        if !sectors_ok {
            log::debug!(
                "Chunk sectors {}+{} exceed block of {} sectors",
                chunk.sector_number,
                chunk.sector_count,
                self.sector_count
            );
            return Err(Error::InvalidParameter);
        }

        let payload_ok = self
            .data_offset
            .checked_add(chunk.compressed_offset)
            .and_then(|start| start.checked_add(chunk.compressed_length))
            .is_some_and(|end| end <= limits.data_fork_end);
        if !payload_ok {
            log::debug!(
                "Chunk payload {:#x}+{:#x} exceeds data fork",
                chunk.compressed_offset,
                chunk.compressed_length
            );
            return Err(Error::InvalidParameter);
        }

        Ok(())
    }

    /// Image sector one past the end of this block
    pub fn sector_end(&self) -> u64 {
        self.sector_number + self.sector_count
    }

    /// Whether `lba` falls inside this block
    pub fn contains(&self, lba: u64) -> bool {
        lba >= self.sector_number && lba < self.sector_end()
    }

    /// Chunk covering image sector `lba`
    pub fn find_chunk(&self, lba: u64) -> Option<&Chunk> {
        let relative = lba.checked_sub(self.sector_number)?;
        self.chunks.iter().find(|chunk| {
            relative >= chunk.sector_number
                && relative - chunk.sector_number < chunk.sector_count
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: BlockLimits = BlockLimits {
        sector_count: 16,
        data_fork_offset: 0,
        data_fork_end: 4096,
    };

    fn raw_block(sector_number: u64, sector_count: u64, chunks: &[[u64; 4]]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"mish");
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&sector_number.to_be_bytes());
        out.extend_from_slice(&sector_count.to_be_bytes());
        out.extend_from_slice(&0u64.to_be_bytes());
        out.extend_from_slice(&[0u8; 8]);
        out.extend_from_slice(&[0u8; 24]);
        out.extend_from_slice(&[0u8; 136]);
        out.extend_from_slice(&(chunks.len() as u32).to_be_bytes());
        for &[sector, count, offset, length] in chunks {
            out.extend_from_slice(&ChunkType::Raw.to_raw().to_be_bytes());
            out.extend_from_slice(&0u32.to_be_bytes());
            out.extend_from_slice(&sector.to_be_bytes());
            out.extend_from_slice(&count.to_be_bytes());
            out.extend_from_slice(&offset.to_be_bytes());
            out.extend_from_slice(&length.to_be_bytes());
        }
        out
    }

    #[test]
    fn test_parse_and_lookup() {
        let raw = raw_block(4, 4, &[[0, 2, 0, 1024], [2, 2, 1024, 1024]]);
        let block = BlockData::parse(&raw, LIMITS).unwrap();

        assert_eq!(block.chunks.len(), 2);
        assert!(block.contains(4));
        assert!(!block.contains(8));
        assert_eq!(block.find_chunk(5).map(|c| c.sector_number), Some(0));
        assert_eq!(block.find_chunk(6).map(|c| c.compressed_offset), Some(1024));
        assert!(block.find_chunk(3).is_none());
    }

    #[test]
    fn test_truncated_table() {
        let raw = raw_block(0, 2, &[[0, 2, 0, 1024]]);
        assert_eq!(BlockData::parse(&raw[..raw.len() - 1], LIMITS), Err(Error::EndOfFile));
        assert_eq!(BlockData::parse(&raw[..100], LIMITS), Err(Error::EndOfFile));
    }

    #[test]
    fn test_wrong_signature() {
        let mut raw = raw_block(0, 2, &[]);
        raw[0] = b'M';
        assert_eq!(BlockData::parse(&raw, LIMITS), Err(Error::Unsupported));
    }

    #[test]
    fn test_ranges_checked() {
        // Block past the image
        let raw = raw_block(15, 2, &[]);
        assert_eq!(BlockData::parse(&raw, LIMITS), Err(Error::InvalidParameter));

        // Chunk past its block
        let raw = raw_block(0, 2, &[[1, 2, 0, 512]]);
        assert_eq!(BlockData::parse(&raw, LIMITS), Err(Error::InvalidParameter));

        // Payload past the data fork
        let raw = raw_block(0, 2, &[[0, 2, 4000, 1024]]);
        assert_eq!(BlockData::parse(&raw, LIMITS), Err(Error::InvalidParameter));

        // Overflowing sector arithmetic
        let raw = raw_block(0, 2, &[[u64::MAX, 2, 0, 0]]);
        assert_eq!(BlockData::parse(&raw, LIMITS), Err(Error::InvalidParameter));
    }

    #[test]
    fn test_data_offset_past_data_fork() {
        let mut raw = raw_block(0, 2, &[[0, 2, 0, 512]]);
        raw[24..32].copy_from_slice(&512u64.to_be_bytes());
        assert_eq!(BlockData::parse(&raw, LIMITS), Err(Error::CompromisedData));

        // Same table once the data fork starts at that offset
        let limits = BlockLimits {
            data_fork_offset: 512,
            ..LIMITS
        };
        let block = BlockData::parse(&raw, limits).unwrap();
        assert_eq!(block.data_offset, 512);
    }
}
