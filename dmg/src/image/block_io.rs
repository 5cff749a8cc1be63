//! Block device shim
//!
//! Two ways to expose a mounted image as a 512-byte block device:
//! - [`DiskImageBlockIo`] implements `gpt_disk_io::BlockIo`, so GPT and
//!   ISO9660 code can read the image like any other disk.
//! - [`BlockDeviceHost`] lets firmware register the image with its own
//!   device model; [`DiskImage::install_block_io`] tracks the registration
//!   and releases it when the image goes away.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;

use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

use super::DiskImage;
use crate::error::{Error, Result};
use crate::types::SECTOR_SIZE;

/// Media description handed to the host on registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockIoMedia {
    /// Always true; the image is fully in memory
    pub media_present: bool,
    /// Always true; writes are rejected
    pub read_only: bool,
    /// Bytes per block (512)
    pub block_size: u32,
    /// Index of the last readable block
    pub last_block: u64,
    /// Size of the image file in bytes
    pub file_size: u64,
    /// Synthetic file name, `DMG_<size in hex>.dmg`
    pub file_name: String,
}

impl BlockIoMedia {
    pub(crate) fn for_image(sector_count: u64, file_size: u64) -> Self {
        Self {
            media_present: true,
            read_only: true,
            block_size: SECTOR_SIZE as u32,
            last_block: sector_count.saturating_sub(1),
            file_size,
            file_name: format!("DMG_{:016X}.dmg", file_size),
        }
    }
}

/// Host side of block device registration
pub trait BlockDeviceHost {
    /// Identifies an installed device
    type Handle;

    /// Publish a device with the given media
    fn install(&mut self, media: &BlockIoMedia) -> Result<Self::Handle>;

    /// Remove a previously installed device
    fn uninstall(&mut self, handle: Self::Handle) -> Result<()>;
}

/// Type-erased installed registration owned by a [`DiskImage`]
pub(crate) trait Registration {
    fn release(self: Box<Self>) -> Result<()>;
}

pub(crate) struct HostRegistration<'h, H: BlockDeviceHost> {
    pub host: &'h mut H,
    pub handle: H::Handle,
}

impl<H: BlockDeviceHost> Registration for HostRegistration<'_, H> {
    fn release(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.host.uninstall(this.handle)
    }
}

/// `BlockIo` view of a disk image
pub struct DiskImageBlockIo<'i, 'a> {
    image: &'i DiskImage<'a>,
}

impl<'i, 'a> DiskImageBlockIo<'i, 'a> {
    pub(crate) fn new(image: &'i DiskImage<'a>) -> Self {
        Self { image }
    }
}

impl BlockIo for DiskImageBlockIo<'_, '_> {
    type Error = Error;

    fn block_size(&self) -> BlockSize {
        BlockSize::BS_512
    }

    fn num_blocks(&mut self) -> core::result::Result<u64, Self::Error> {
        Ok(self.image.sector_count())
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> core::result::Result<(), Self::Error> {
        self.image.read(start_lba.0, dst)
    }

    fn write_blocks(&mut self, start_lba: Lba, _src: &[u8]) -> core::result::Result<(), Self::Error> {
        log::debug!("Rejecting write to image LBA {}", start_lba.0);
        Err(Error::WriteProtected)
    }

    fn flush(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }
}
