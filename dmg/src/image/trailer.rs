//! UDIF trailer (`koly` block)
//!
//! The last 512 bytes of every image. All fields are big-endian.

use crate::error::{Error, Result};
use crate::types::{Checksum, CHECKSUM_WORDS, TRAILER_SIGNATURE, TRAILER_VERSION};
use crate::utils::endian::{read_array, read_be_u32, read_be_u64};

/// Parsed image trailer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// `koly`
    pub signature: u32,
    /// Format version (4)
    pub version: u32,
    /// Size of this structure (512)
    pub header_size: u32,
    /// Image flags
    pub flags: u32,
    /// Running data fork offset (segmented images)
    pub running_data_fork_offset: u64,
    /// Offset of the data fork
    pub data_fork_offset: u64,
    /// Length of the data fork
    pub data_fork_length: u64,
    /// Offset of the legacy resource fork
    pub rsrc_fork_offset: u64,
    /// Length of the legacy resource fork
    pub rsrc_fork_length: u64,
    /// Segment index
    pub segment_number: u32,
    /// Total segments
    pub segment_count: u32,
    /// Segment UUID
    pub segment_id: [u8; 16],
    /// Checksum over the data fork
    pub data_fork_checksum: Checksum,
    /// Offset of the property list
    pub xml_offset: u64,
    /// Length of the property list
    pub xml_length: u64,
    /// Master checksum
    pub checksum: Checksum,
    /// Image variant
    pub image_variant: u32,
    /// Sectors in the decoded image
    pub sector_count: u64,
}

/// Parse a checksum record at `offset`
pub(crate) fn parse_checksum(data: &[u8], offset: usize) -> Option<Checksum> {
    let mut words = [0u32; CHECKSUM_WORDS];
    for (i, word) in words.iter_mut().enumerate() {
        *word = read_be_u32(data, offset + 8 + i * 4)?;
    }
    Some(Checksum {
        kind: read_be_u32(data, offset)?,
        size: read_be_u32(data, offset + 4)?,
        data: words,
    })
}

impl Trailer {
    /// On-disk size
    pub const SIZE: usize = 512;

    /// Parse the trailer fields from exactly [`Trailer::SIZE`] bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::InvalidParameter);
        }
        let u32_at = |off| read_be_u32(data, off).ok_or(Error::InvalidParameter);
        let u64_at = |off| read_be_u64(data, off).ok_or(Error::InvalidParameter);
        let checksum_at = |off| parse_checksum(data, off).ok_or(Error::InvalidParameter);

        Ok(Self {
            signature: u32_at(0)?,
            version: u32_at(4)?,
            header_size: u32_at(8)?,
            flags: u32_at(12)?,
            running_data_fork_offset: u64_at(16)?,
            data_fork_offset: u64_at(24)?,
            data_fork_length: u64_at(32)?,
            rsrc_fork_offset: u64_at(40)?,
            rsrc_fork_length: u64_at(48)?,
            segment_number: u32_at(56)?,
            segment_count: u32_at(60)?,
            segment_id: *read_array(data, 64).ok_or(Error::InvalidParameter)?,
            data_fork_checksum: checksum_at(80)?,
            xml_offset: u64_at(216)?,
            xml_length: u64_at(224)?,
            checksum: checksum_at(352)?,
            image_variant: u32_at(488)?,
            sector_count: u64_at(492)?,
        })
    }

    /// Validate the trailer against the position it was found at
    ///
    /// `trailer_offset` is where the trailer starts in the image buffer; the
    /// XML and data fork regions must end before it.
    pub fn validate(&self, trailer_offset: u64) -> Result<()> {
        if self.signature != TRAILER_SIGNATURE {
            log::debug!("Trailer signature {:#010x} is not koly", self.signature);
            return Err(Error::Unsupported);
        }
        if self.version != TRAILER_VERSION {
            log::debug!("Trailer version {} unsupported", self.version);
            return Err(Error::Unsupported);
        }
        if self.header_size as usize != Self::SIZE {
            log::debug!("Trailer header size {} unsupported", self.header_size);
            return Err(Error::Unsupported);
        }
        if self.segment_count > 1 {
            log::debug!("Segmented images ({} segments) are unsupported", self.segment_count);
            return Err(Error::Unsupported);
        }
        if self.rsrc_fork_offset != 0 || self.rsrc_fork_length != 0 {
            log::debug!("Resource forks are unsupported");
            return Err(Error::Unsupported);
        }
        if self.xml_length == 0 || self.xml_length > u64::from(u32::MAX) {
            log::debug!("Property list length {} out of range", self.xml_length);
            return Err(Error::InvalidParameter);
        }
        if self.data_fork_checksum.size as usize > CHECKSUM_WORDS * 32 {
            log::debug!("Data fork checksum of {} bits", self.data_fork_checksum.size);
            return Err(Error::InvalidParameter);
        }

        let regions = [
            ("property list", self.xml_offset, self.xml_length),
            ("data fork", self.data_fork_offset, self.data_fork_length),
        ];
        for (name, offset, length) in regions {
            match offset.checked_add(length) {
                Some(end) if end <= trailer_offset => {}
                _ => {
                    log::debug!(
                        "{} {:#x}+{:#x} overlaps trailer at {:#x}",
                        name,
                        offset,
                        length,
                        trailer_offset
                    );
                    return Err(Error::InvalidParameter);
                }
            }
        }

        Ok(())
    }
}
