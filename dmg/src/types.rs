//! Common types and constants for UDIF images

/// UDIF sector size (always 512 bytes)
pub const SECTOR_SIZE: usize = 512;

/// Trailer signature "koly"
pub const TRAILER_SIGNATURE: u32 = 0x6B6F_6C79;

/// Supported trailer version
pub const TRAILER_VERSION: u32 = 4;

/// Block table signature "mish"
pub const BLOCK_SIGNATURE: u32 = 0x6D69_7368;

/// Checksum type for CRC32 data fork checksums
pub const CHECKSUM_TYPE_CRC32: u32 = 2;

/// Number of 32-bit words in a UDIF checksum
pub const CHECKSUM_WORDS: usize = 32;

/// Chunk compression/storage type from a `mish` chunk entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    /// Sectors read as zeros
    Zero,
    /// Sectors stored uncompressed
    Raw,
    /// Free space, read as zeros
    Ignore,
    /// Apple Data Compression
    Adc,
    /// zlib stream
    Zlib,
    /// bzip2 stream
    Bzip2,
    /// Comment marker, carries no data
    Comment,
    /// Block terminator
    Last,
    /// Anything else (LZFSE, LZMA, ...)
    Unknown(u32),
}

impl ChunkType {
    /// Decode the on-disk type field
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0x0000_0000 => Self::Zero,
            0x0000_0001 => Self::Raw,
            0x0000_0002 => Self::Ignore,
            0x8000_0004 => Self::Adc,
            0x8000_0005 => Self::Zlib,
            0x8000_0006 => Self::Bzip2,
            0x7FFF_FFFE => Self::Comment,
            0xFFFF_FFFF => Self::Last,
            other => Self::Unknown(other),
        }
    }

    /// Encode back to the on-disk type field
    pub const fn to_raw(self) -> u32 {
        match self {
            Self::Zero => 0x0000_0000,
            Self::Raw => 0x0000_0001,
            Self::Ignore => 0x0000_0002,
            Self::Adc => 0x8000_0004,
            Self::Zlib => 0x8000_0005,
            Self::Bzip2 => 0x8000_0006,
            Self::Comment => 0x7FFF_FFFE,
            Self::Last => 0xFFFF_FFFF,
            Self::Unknown(raw) => raw,
        }
    }
}

/// Checksum record shared by the trailer and block tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum {
    /// Checksum algorithm
    pub kind: u32,
    /// Checksum size in bits
    pub size: u32,
    /// Checksum words
    pub data: [u32; CHECKSUM_WORDS],
}

impl Checksum {
    /// On-disk size of a checksum record
    pub const SIZE: usize = 8 + CHECKSUM_WORDS * 4;
}
