//! Chunklist verification
//!
//! A chunklist is the signed manifest Apple ships next to recovery images.
//! It splits the image into consecutive chunks and records the SHA-256 of
//! each one. The header and chunk table are covered by an RSA-2048
//! signature, so once the signature checks out the chunk hashes can be
//! trusted to authenticate the image bytes.

mod header;

pub use header::{ChunkEntry, ChunklistHeader};

use crate::crypto::{self, PublicKey, RSA2048_SIZE, SHA256_DIGEST_SIZE};
use crate::error::{Error, Result};
use crate::utils::endian::{read_array, sub_slice};

/// Parsed chunklist borrowing the caller's buffer
#[derive(Debug, Clone)]
pub struct Chunklist<'a> {
    header: ChunklistHeader,
    chunks: &'a [u8],
    signature: &'a [u8; RSA2048_SIZE],
    hash: [u8; SHA256_DIGEST_SIZE],
}

impl<'a> Chunklist<'a> {
    /// Parse and bounds-check a chunklist
    ///
    /// Computes the SHA-256 of everything before the signature, which is the
    /// digest the signature covers.
    pub fn initialize(buffer: &'a [u8]) -> Result<Self> {
        let header = ChunklistHeader::parse(buffer)?;
        header.validate()?;

        let table_len = header
            .chunk_count
            .checked_mul(ChunkEntry::SIZE as u64)
            .ok_or(Error::InvalidParameter)?;
        let chunks = sub_slice(buffer, header.chunk_offset, table_len).ok_or_else(|| {
            log::debug!(
                "Chunk table {:#x}+{:#x} exceeds chunklist of {} bytes",
                header.chunk_offset,
                table_len,
                buffer.len()
            );
            Error::InvalidParameter
        })?;

        let sig_start = usize::try_from(header.sig_offset).map_err(|_| Error::InvalidParameter)?;
        let signature = read_array::<RSA2048_SIZE>(buffer, sig_start).ok_or_else(|| {
            log::debug!("Signature at {:#x} exceeds chunklist", sig_start);
            Error::InvalidParameter
        })?;

        // Both fit the buffer, so these sums cannot overflow
        let table_end = header.chunk_offset + table_len;
        if header.chunk_offset < ChunklistHeader::SIZE as u64 || table_end > header.sig_offset {
            log::debug!("Chunk table overlaps the header or signature");
            return Err(Error::Unsupported);
        }

        let hash = crypto::sha256(&buffer[..sig_start]);

        log::trace!(
            "Chunklist: {} chunks, table at {:#x}, signature at {:#x}",
            header.chunk_count,
            header.chunk_offset,
            header.sig_offset
        );

        Ok(Self {
            header,
            chunks,
            signature,
            hash,
        })
    }

    /// Header fields
    pub fn header(&self) -> &ChunklistHeader {
        &self.header
    }

    /// Chunk entries in file order
    pub fn chunks(&self) -> impl Iterator<Item = ChunkEntry<'a>> + 'a {
        self.chunks.chunks_exact(ChunkEntry::SIZE).filter_map(ChunkEntry::parse)
    }

    /// SHA-256 of the header and chunk table
    pub fn hash(&self) -> &[u8; SHA256_DIGEST_SIZE] {
        &self.hash
    }

    /// Signature bytes as stored (little-endian)
    pub fn signature(&self) -> &[u8; RSA2048_SIZE] {
        self.signature
    }

    /// Total bytes the chunk table describes
    pub fn covered_length(&self) -> u64 {
        self.chunks().map(|c| u64::from(c.length)).sum()
    }

    /// Check every chunk hash against consecutive slices of `data`
    ///
    /// Chunks are checked in order and the first mismatch is reported. Data
    /// past the last chunk is not covered and not rejected.
    pub fn verify_data(&self, data: &[u8]) -> Result<()> {
        let mut remaining = data;

        for (index, chunk) in self.chunks().enumerate() {
            let len = chunk.length as usize;
            if len > remaining.len() {
                log::debug!(
                    "Chunk {} wants {} bytes, {} left",
                    index,
                    len,
                    remaining.len()
                );
                return Err(Error::EndOfFile);
            }

            let (current, rest) = remaining.split_at(len);
            if crypto::sha256(current) != *chunk.checksum {
                log::warn!("Chunk {} hash mismatch", index);
                return Err(Error::CompromisedChunk { index });
            }
            remaining = rest;
        }

        Ok(())
    }

    /// Check the signature over the header and chunk table
    pub fn verify_signature(&self, key: &PublicKey) -> bool {
        let mut signature = *self.signature;
        signature.reverse();
        let ok = key.verify_sha256(&self.hash, &signature);
        if !ok {
            log::debug!("Chunklist signature does not match key");
        }
        ok
    }
}
