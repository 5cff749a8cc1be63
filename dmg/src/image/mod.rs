//! Disk image parsing and sector reads
//!
//! [`DiskImage`] borrows the whole image file and answers 512-byte sector
//! reads by locating the chunk that stores each sector and copying,
//! zero-filling or decompressing it. Nothing is cached between reads.
//!
//! # Layout
//!
//! ```text
//! +-------------+----------------+----------+
//! | data fork   | property list  | trailer  |
//! | (chunks)    | (blkx → mish)  | (koly)   |
//! +-------------+----------------+----------+
//! ```

mod block;
mod block_io;
mod plist;
mod trailer;

pub use block::{BlockData, Chunk};
pub use block_io::{BlockDeviceHost, BlockIoMedia, DiskImageBlockIo};
pub use plist::ResourceForkParser;
pub use trailer::Trailer;

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use block::BlockLimits;
use block_io::{HostRegistration, Registration};

use crate::chunklist::Chunklist;
use crate::compression::{self, CompressionError};
use crate::error::{Error, Result};
use crate::types::{ChunkType, CHECKSUM_TYPE_CRC32, SECTOR_SIZE};
use crate::utils::checksum::crc32;
use crate::utils::endian::sub_slice;
use crate::utils::sector::{is_sector_aligned, sectors_to_len};

/// Largest decompressed property list accepted
const MAX_PLIST_SIZE: usize = 64 * 1024 * 1024;

/// A parsed disk image borrowing the caller's buffer
pub struct DiskImage<'a> {
    buffer: &'a [u8],
    length: usize,
    trailer: Trailer,
    sector_count: u64,
    blocks: Vec<BlockData>,
    registration: Option<Box<dyn Registration + 'a>>,
}

impl fmt::Debug for DiskImage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskImage")
            .field("length", &self.length)
            .field("sector_count", &self.sector_count)
            .field("blocks", &self.blocks.len())
            .field("block_io_installed", &self.registration.is_some())
            .finish()
    }
}

impl<'a> DiskImage<'a> {
    /// Parse an image held entirely in memory
    ///
    /// The trailer is read from the last 512 bytes. With `verify_checksum`
    /// the data fork must carry a matching CRC32. The property list is
    /// inflated if compressed and handed to `parser`, and every block table
    /// it returns is validated against the image geometry.
    pub fn initialize<P>(buffer: &'a [u8], verify_checksum: bool, parser: &P) -> Result<Self>
    where
        P: ResourceForkParser + ?Sized,
    {
        if buffer.len() <= Trailer::SIZE {
            log::debug!("Image of {} bytes has no room for a trailer", buffer.len());
            return Err(Error::InvalidParameter);
        }

        let trailer_offset = buffer.len() - Trailer::SIZE;
        let trailer = Trailer::parse(&buffer[trailer_offset..])?;
        trailer.validate(trailer_offset as u64)?;

        let data_fork = sub_slice(buffer, trailer.data_fork_offset, trailer.data_fork_length)
            .ok_or(Error::InvalidParameter)?;
        if verify_checksum {
            verify_data_fork(&trailer, data_fork)?;
        }

        let xml = sub_slice(buffer, trailer.xml_offset, trailer.xml_length)
            .ok_or(Error::InvalidParameter)?;
        let plist = inflate_plist(xml)?;

        let tables = parser.block_tables(&plist)?;
        if tables.is_empty() {
            log::debug!("Property list has no block tables");
            return Err(Error::InvalidParameter);
        }

        let limits = BlockLimits {
            sector_count: trailer.sector_count,
            data_fork_offset: trailer.data_fork_offset,
            data_fork_end: trailer.data_fork_offset + trailer.data_fork_length,
        };
        let mut blocks = Vec::new();
        blocks.try_reserve_exact(tables.len())?;
        for (index, table) in tables.iter().enumerate() {
            let block = BlockData::parse(table, limits).inspect_err(|err| {
                log::debug!("Block table {} rejected: {}", index, err);
            })?;
            blocks.push(block);
        }

        log::debug!(
            "Image: {} sectors in {} blocks, data fork {:#x}+{:#x}",
            trailer.sector_count,
            blocks.len(),
            trailer.data_fork_offset,
            trailer.data_fork_length
        );

        Ok(Self {
            buffer,
            length: buffer.len(),
            sector_count: trailer.sector_count,
            trailer,
            blocks,
            registration: None,
        })
    }

    /// Parsed trailer
    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    /// Parsed block tables in property list order
    pub fn blocks(&self) -> &[BlockData] {
        &self.blocks
    }

    /// Sectors in the decoded image
    pub fn sector_count(&self) -> u64 {
        self.sector_count
    }

    /// Image length in bytes, trailer included
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Read whole sectors starting at `lba` into `out`
    ///
    /// `out.len()` must be a multiple of 512 and the range must lie within
    /// the image. Compressed chunks are decompressed in full on every call.
    pub fn read(&self, lba: u64, out: &mut [u8]) -> Result<()> {
        if out.is_empty() {
            return Ok(());
        }
        if !is_sector_aligned(out.len()) {
            log::debug!("Read of {} bytes is not sector aligned", out.len());
            return Err(Error::InvalidParameter);
        }
        let sectors = (out.len() / SECTOR_SIZE) as u64;
        let in_range = lba
            .checked_add(sectors)
            .is_some_and(|end| end <= self.sector_count);
        if !in_range {
            log::debug!(
                "Read {}+{} past image of {} sectors",
                lba,
                sectors,
                self.sector_count
            );
            return Err(Error::InvalidParameter);
        }

        let mut current = lba;
        let mut written = 0usize;
        while written < out.len() {
            let (block, chunk) = self.locate(current).ok_or_else(|| {
                log::debug!("Sector {} is not covered by any chunk", current);
                Error::DeviceError
            })?;

            // Sectors into the chunk and how many of them this pass copies
            let skip = current - (block.sector_number + chunk.sector_number);
            let remaining = ((out.len() - written) / SECTOR_SIZE) as u64;
            let count = (chunk.sector_count - skip).min(remaining);
            let len = count as usize * SECTOR_SIZE;
            let skip_bytes = skip as usize * SECTOR_SIZE;
            let dst = &mut out[written..written + len];

            match chunk.kind {
                ChunkType::Zero | ChunkType::Ignore => dst.fill(0),
                ChunkType::Raw => {
                    let src = self
                        .payload(block, chunk)?
                        .get(skip_bytes..skip_bytes + len)
                        .ok_or_else(|| {
                            log::debug!("Raw chunk at sector {} is shorter than its sectors", current);
                            Error::DeviceError
                        })?;
                    dst.copy_from_slice(src);
                }
                ChunkType::Adc | ChunkType::Zlib | ChunkType::Bzip2 => {
                    let decoded = self.decode_chunk(block, chunk)?;
                    dst.copy_from_slice(&decoded[skip_bytes..skip_bytes + len]);
                }
                ChunkType::Comment | ChunkType::Last => {
                    log::debug!("Read hit {:?} chunk at sector {}", chunk.kind, current);
                    return Err(Error::DeviceError);
                }
                ChunkType::Unknown(raw) => {
                    log::debug!("Chunk type {:#010x} unsupported", raw);
                    return Err(Error::Unsupported);
                }
            }

            current += count;
            written += len;
        }

        log::trace!("Read {} sectors at {}", sectors, lba);
        Ok(())
    }

    /// First block and chunk that cover image sector `lba`
    fn locate(&self, lba: u64) -> Option<(&BlockData, &Chunk)> {
        self.blocks
            .iter()
            .filter(|block| block.contains(lba))
            .find_map(|block| block.find_chunk(lba).map(|chunk| (block, chunk)))
    }

    /// Stored bytes of a chunk
    fn payload(&self, block: &BlockData, chunk: &Chunk) -> Result<&'a [u8]> {
        block
            .data_offset
            .checked_add(chunk.compressed_offset)
            .and_then(|start| sub_slice(self.buffer, start, chunk.compressed_length))
            .ok_or(Error::DeviceError)
    }

    /// Decompress a whole chunk into a fresh buffer
    fn decode_chunk(&self, block: &BlockData, chunk: &Chunk) -> Result<Vec<u8>> {
        let src = self.payload(block, chunk)?;
        let total = sectors_to_len(chunk.sector_count).ok_or(Error::OutOfResources)?;

        let mut decoded = Vec::new();
        decoded.try_reserve_exact(total)?;
        decoded.resize(total, 0);

        let result = match chunk.kind {
            ChunkType::Adc => compression::decompress_adc(&mut decoded, src),
            ChunkType::Zlib => compression::decompress_zlib(&mut decoded, src),
            #[cfg(feature = "bzip2")]
            ChunkType::Bzip2 => compression::decompress_bzip2(&mut decoded, src),
            other => {
                log::debug!("No decoder for {:?} chunks", other);
                return Err(Error::Unsupported);
            }
        };

        match result {
            Ok(n) if n == total => Ok(decoded),
            Ok(n) => {
                log::warn!(
                    "{:?} chunk decoded to {} bytes, expected {}",
                    chunk.kind,
                    n,
                    total
                );
                Err(Error::DeviceError)
            }
            Err(CompressionError::OutOfMemory) => Err(Error::OutOfResources),
            Err(err) => {
                log::warn!("{:?} chunk failed to decode: {}", chunk.kind, err);
                Err(Error::DeviceError)
            }
        }
    }

    /// Check the image bytes against a chunklist
    ///
    /// Does not check the chunklist's signature; see
    /// [`Chunklist::verify_signature`].
    pub fn verify_chunklist(&self, chunklist: &Chunklist<'_>) -> Result<()> {
        chunklist.verify_data(&self.buffer[..self.length])
    }

    /// `BlockIo` view of this image
    pub fn block_io(&self) -> DiskImageBlockIo<'_, 'a> {
        DiskImageBlockIo::new(self)
    }

    /// Register this image with a host block device layer
    ///
    /// The registration is released by [`DiskImage::uninstall_block_io`],
    /// [`DiskImage::free`] or on drop. Only one registration may exist.
    pub fn install_block_io<H>(&mut self, host: &'a mut H, file_size: u64) -> Result<BlockIoMedia>
    where
        H: BlockDeviceHost + 'a,
        H::Handle: 'a,
    {
        if self.registration.is_some() {
            log::debug!("Image block device already installed");
            return Err(Error::InvalidParameter);
        }
        if file_size == 0 {
            return Err(Error::InvalidParameter);
        }

        let media = BlockIoMedia::for_image(self.sector_count, file_size);
        let handle = host.install(&media)?;
        self.registration = Some(Box::new(HostRegistration { host, handle }));

        log::debug!("Installed image block device {}", media.file_name);
        Ok(media)
    }

    /// Release the host registration, if any
    pub fn uninstall_block_io(&mut self) -> Result<()> {
        match self.registration.take() {
            Some(registration) => registration.release(),
            None => Ok(()),
        }
    }

    /// Drop the context, releasing any host registration
    ///
    /// The caller's buffer is untouched.
    pub fn free(mut self) -> Result<()> {
        self.uninstall_block_io()
    }
}

impl Drop for DiskImage<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.uninstall_block_io() {
            log::warn!("Failed to uninstall image block device: {}", err);
        }
    }
}

/// Check the data fork CRC32 recorded in the trailer
fn verify_data_fork(trailer: &Trailer, data_fork: &[u8]) -> Result<()> {
    let checksum = &trailer.data_fork_checksum;
    if checksum.kind != CHECKSUM_TYPE_CRC32 || checksum.size != 32 {
        log::debug!(
            "Data fork checksum type {} ({} bits) unsupported",
            checksum.kind,
            checksum.size
        );
        return Err(Error::Unsupported);
    }

    let actual = crc32(data_fork);
    if actual != checksum.data[0] {
        log::warn!(
            "Data fork CRC32 {:#010x} does not match trailer {:#010x}",
            actual,
            checksum.data[0]
        );
        return Err(Error::CompromisedData);
    }
    Ok(())
}

/// Inflate the property list if it is stored zlib-compressed
fn inflate_plist(xml: &[u8]) -> Result<Cow<'_, [u8]>> {
    if !compression::is_zlib_stream(xml) {
        return Ok(Cow::Borrowed(xml));
    }
    compression::decompress_zlib_to_vec(xml, MAX_PLIST_SIZE)
        .map(Cow::Owned)
        .map_err(|err| {
            log::debug!("Compressed property list rejected: {}", err);
            match err {
                CompressionError::OutOfMemory | CompressionError::TooLarge => Error::OutOfResources,
                _ => Error::InvalidParameter,
            }
        })
}
