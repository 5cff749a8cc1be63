//! zlib (RFC 1950) wrappers over `miniz_oxide`'s core state machines
//!
//! Output goes straight into caller buffers or into a vector grown with
//! `try_reserve`, so running out of memory is reported instead of aborting.

use alloc::vec::Vec;

use miniz_oxide::deflate::core::{
    compress, create_comp_flags_from_zip_params, CompressorOxide, TDEFLFlush, TDEFLStatus,
};
use miniz_oxide::inflate::core::{decompress, inflate_flags, DecompressorOxide};
use miniz_oxide::inflate::TINFLStatus;

use super::{check_limits, CompressionError, CompressionResult, MAX_LENGTH};

/// zlib's default trade-off between speed and ratio
const COMPRESSION_LEVEL: i32 = 6;

/// 32 KiB window; a positive value selects the zlib wrapper
const WINDOW_BITS: i32 = 15;

/// Smallest output buffer `decompress_zlib_to_vec` starts from
const MIN_OUTPUT: usize = 1024;

/// Whole input present, output addressed from the start of the buffer
const INFLATE_FLAGS: u32 = inflate_flags::TINFL_FLAG_PARSE_ZLIB_HEADER
    | inflate_flags::TINFL_FLAG_USING_NON_WRAPPING_OUTPUT_BUF
    | inflate_flags::TINFL_FLAG_COMPUTE_ADLER32;

/// Compress `src` into `dst` as a zlib stream
///
/// Returns the stream length, or [`CompressionError::Overflow`] if it does
/// not fit.
pub fn compress_zlib(dst: &mut [u8], src: &[u8]) -> CompressionResult<usize> {
    check_limits(dst.len(), src.len())?;

    let flags = create_comp_flags_from_zip_params(COMPRESSION_LEVEL, WINDOW_BITS, 0);
    let mut compressor = CompressorOxide::new(flags);
    let mut consumed = 0;
    let mut written = 0;

    loop {
        let (status, read, produced) = compress(
            &mut compressor,
            &src[consumed..],
            &mut dst[written..],
            TDEFLFlush::Finish,
        );
        consumed += read;
        written += produced;

        match status {
            TDEFLStatus::Done => return Ok(written),
            TDEFLStatus::Okay if written < dst.len() && (read > 0 || produced > 0) => {}
            TDEFLStatus::Okay => return Err(CompressionError::Overflow),
            _ => return Err(CompressionError::Corrupt),
        }
    }
}

/// Inflate a complete zlib stream from `src` into `dst`
///
/// The Adler-32 trailer is verified. Returns the number of bytes written.
pub fn decompress_zlib(dst: &mut [u8], src: &[u8]) -> CompressionResult<usize> {
    check_limits(dst.len(), src.len())?;

    let mut state = DecompressorOxide::new();
    let (status, _consumed, written) = decompress(&mut state, src, dst, 0, INFLATE_FLAGS);
    match status {
        TINFLStatus::Done => Ok(written),
        TINFLStatus::HasMoreOutput => Err(CompressionError::Overflow),
        other => Err(inflate_error(other)),
    }
}

/// Inflate a zlib stream of unknown output size, up to `limit` bytes
///
/// The output buffer doubles as needed. Growth past `limit` is
/// [`CompressionError::TooLarge`], a failed reservation is
/// [`CompressionError::OutOfMemory`].
pub fn decompress_zlib_to_vec(src: &[u8], limit: usize) -> CompressionResult<Vec<u8>> {
    check_limits(0, src.len())?;
    let limit = limit.min(MAX_LENGTH);

    let mut state = DecompressorOxide::new();
    let mut out = Vec::new();
    grow(&mut out, src.len().saturating_mul(2).max(MIN_OUTPUT).min(limit))?;

    let mut consumed = 0;
    let mut written = 0;
    loop {
        let (status, read, produced) =
            decompress(&mut state, &src[consumed..], &mut out, written, INFLATE_FLAGS);
        consumed += read;
        written += produced;

        match status {
            TINFLStatus::Done => {
                out.truncate(written);
                return Ok(out);
            }
            TINFLStatus::HasMoreOutput => {
                if out.len() >= limit {
                    log::debug!("zlib output exceeds {} bytes", limit);
                    return Err(CompressionError::TooLarge);
                }
                let new_len = out.len().saturating_mul(2).max(MIN_OUTPUT).min(limit);
                grow(&mut out, new_len)?;
            }
            other => return Err(inflate_error(other)),
        }
    }
}

/// Zero-extend `out` to `len` bytes without aborting on allocation failure
fn grow(out: &mut Vec<u8>, len: usize) -> CompressionResult<()> {
    out.try_reserve_exact(len.saturating_sub(out.len()))
        .map_err(|_| CompressionError::OutOfMemory)?;
    out.resize(len, 0);
    Ok(())
}

fn inflate_error(status: TINFLStatus) -> CompressionError {
    match status {
        TINFLStatus::FailedCannotMakeProgress | TINFLStatus::NeedsMoreInput => {
            CompressionError::Truncated
        }
        _ => CompressionError::Corrupt,
    }
}

/// Whether `src` starts with a valid zlib header (deflate method, FCHECK ok)
pub fn is_zlib_stream(src: &[u8]) -> bool {
    match src {
        [cmf, flg, ..] => cmf & 0x0F == 8 && ((u16::from(*cmf) << 8) | u16::from(*flg)) % 31 == 0,
        _ => false,
    }
}
