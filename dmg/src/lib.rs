//! Apple Disk Image (UDIF) Implementation
//!
//! A `no_std` reader for compressed Apple disk images with chunklist
//! authentication, used to boot macOS recovery images from MorpheusX.
//!
//! # Overview
//!
//! A DMG is a flat byte buffer ending in a 512-byte `koly` trailer. The trailer
//! points at an embedded property list whose `blkx` entries hold `mish` block
//! tables. Each block maps a range of 512-byte sectors onto chunks that are
//! stored zero-filled, raw, or compressed. This crate provides:
//! - Trailer and block table parsing with checked offsets
//! - Sector reads that decompress chunks on demand
//! - A `gpt_disk_io::BlockIo` adapter for mounting the image as a device
//! - Chunklist parsing, SHA-256 chunk verification and RSA-2048 signatures
//! - The codec library (LZSS, LZVN, zlib, ADC, masked RLE24, Adler-32)
//!
//! # Architecture
//!
//! The implementation is layered:
//! 1. **Compression layer** - Stateless codecs over slices
//! 2. **Crypto layer** - SHA-256 digests and RSA public keys
//! 3. **Chunklist layer** - Signed per-chunk hash manifests
//! 4. **Image layer** - Trailer, block tables, sector reads, block device shim
//! 5. **Boot layer** - Policy-driven mount and authentication
//!
//! # Usage
//!
//! ```ignore
//! use dmg::{Chunklist, DiskImage};
//!
//! // Parse the image (XML block list handed to the plist collaborator)
//! let image = DiskImage::initialize(&dmg_bytes, true, &plist_parser)?;
//!
//! // Authenticate it against its chunklist
//! let chunklist = Chunklist::initialize(&chunklist_bytes)?;
//! if !chunklist.verify_signature(&apple_key) {
//!     return Err(dmg::Error::CompromisedData);
//! }
//! image.verify_chunklist(&chunklist)?;
//!
//! // Read sectors, or hand the image to iso/GPT code as a block device
//! let mut sector = [0u8; 512];
//! image.read(0, &mut sector)?;
//! let mut block_io = image.block_io();
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod boot;
pub mod chunklist;
pub mod compression;
pub mod crypto;
pub mod error;
pub mod image;
pub mod types;
pub mod utils;

pub use error::{Error, Result};
pub use types::{ChunkType, SECTOR_SIZE};

// High-level API exports
pub use boot::{load_disk_image, LoadPolicy};
pub use chunklist::Chunklist;
pub use crypto::PublicKey;
pub use image::{BlockDeviceHost, BlockIoMedia, DiskImage, DiskImageBlockIo, ResourceForkParser};
