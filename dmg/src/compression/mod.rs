//! Codec library
//!
//! Stateless (de)compression routines over caller-provided slices. Every
//! function takes the destination first and returns the number of bytes it
//! produced. None of them keep state between calls, and all of them refuse
//! buffers larger than [`MAX_LENGTH`] so that sizes stay representable in the
//! 32-bit length fields of the formats that embed them.
//!
//! | Codec  | Decompress | Compress | Used by                         |
//! |--------|------------|----------|---------------------------------|
//! | LZSS   | yes        | yes      | kernel caches                   |
//! | LZVN   | yes        | -        | kernel caches                   |
//! | zlib   | yes        | yes      | DMG `ZLIB` chunks, resource XML |
//! | ADC    | yes        | -        | DMG `ADC` chunks                |
//! | BZ2    | `bzip2`    | -        | DMG `BZ2` chunks                |
//! | RLE24  | yes        | -        | icon images                     |

mod adc;
mod adler32;
#[cfg(feature = "bzip2")]
mod bzip2;
mod lzss;
mod lzvn;
mod rle;
mod zlib;

pub use adc::decompress_adc;
pub use adler32::{adler32, Adler32};
#[cfg(feature = "bzip2")]
pub use self::bzip2::decompress_bzip2;
pub use lzss::{compress_lzss, decompress_lzss};
pub use lzvn::decompress_lzvn;
pub use rle::decompress_masked_rle24;
pub use zlib::{compress_zlib, decompress_zlib, decompress_zlib_to_vec, is_zlib_stream};

/// Largest buffer any codec accepts (1 GiB)
pub const MAX_LENGTH: usize = 1024 * 1024 * 1024;

/// Errors reported by the codec library
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CompressionError {
    /// Source or destination exceeds [`MAX_LENGTH`]
    #[error("Buffer exceeds the codec size limit")]
    TooLarge,

    /// Output does not fit the destination buffer
    #[error("Destination buffer too small")]
    Overflow,

    /// Source ended in the middle of a token
    #[error("Compressed stream is truncated")]
    Truncated,

    /// Stream contains invalid tokens or back-references
    #[error("Compressed stream is corrupt")]
    Corrupt,

    /// Codec allocation failed
    #[error("Out of memory")]
    OutOfMemory,
}

/// Result type for codec operations
pub type CompressionResult<T> = core::result::Result<T, CompressionError>;

/// Reject oversized buffers before touching them
#[inline]
fn check_limits(dst_len: usize, src_len: usize) -> CompressionResult<()> {
    if dst_len > MAX_LENGTH || src_len > MAX_LENGTH {
        return Err(CompressionError::TooLarge);
    }
    Ok(())
}

/// Copy `len` bytes from `distance` bytes back in `dst`, byte by byte so that
/// overlapping references repeat the pattern.
#[inline]
fn copy_match(dst: &mut [u8], pos: usize, distance: usize, len: usize) -> CompressionResult<()> {
    if distance == 0 || distance > pos {
        return Err(CompressionError::Corrupt);
    }
    let end = pos.checked_add(len).ok_or(CompressionError::Overflow)?;
    if end > dst.len() {
        return Err(CompressionError::Overflow);
    }
    for i in pos..end {
        dst[i] = dst[i - distance];
    }
    Ok(())
}
