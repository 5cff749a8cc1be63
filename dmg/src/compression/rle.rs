//! Masked RLE24 (icon images)
//!
//! The source holds three run-length encoded planes, red then green then
//! blue. Each plane is a sequence of runs:
//! - `control & 0x80 != 0`: one value byte repeated `control - 125` times
//! - otherwise: `control + 1` literal bytes
//!
//! Planes are scattered into a BGRA destination with a 4-byte stride and the
//! separate 8-bit mask supplies alpha.

use super::{check_limits, CompressionError, CompressionResult};

const BYTES_PER_PIXEL: usize = 4;
/// Byte offsets of red, green and blue within a BGRA pixel, in plane order
const PLANE_OFFSETS: [usize; 3] = [2, 1, 0];
const ALPHA_OFFSET: usize = 3;

/// Decode one plane starting at `src[pos]` and return the position after it
fn decode_plane(dst: &mut [u8], offset: usize, src: &[u8], mut pos: usize) -> CompressionResult<usize> {
    let pixels = dst.len() / BYTES_PER_PIXEL;
    let mut pixel = 0usize;

    while pixel < pixels {
        let control = *src.get(pos).ok_or(CompressionError::Truncated)?;
        pos += 1;

        if control & 0x80 != 0 {
            let run = usize::from(control) - 125;
            let value = *src.get(pos).ok_or(CompressionError::Truncated)?;
            pos += 1;
            if pixels - pixel < run {
                return Err(CompressionError::Overflow);
            }
            for p in pixel..pixel + run {
                dst[p * BYTES_PER_PIXEL + offset] = value;
            }
            pixel += run;
        } else {
            let run = usize::from(control) + 1;
            if pixels - pixel < run {
                return Err(CompressionError::Overflow);
            }
            let literals = src
                .get(pos..pos + run)
                .ok_or(CompressionError::Truncated)?;
            for (p, &value) in (pixel..pixel + run).zip(literals) {
                dst[p * BYTES_PER_PIXEL + offset] = value;
            }
            pos += run;
            pixel += run;
        }
    }

    Ok(pos)
}

/// Decode masked RLE24 planes from `src` into BGRA pixels in `dst`
///
/// `dst.len()` must be a non-zero multiple of four and `mask` must hold one
/// alpha byte per pixel. With `premultiply` the colour channels are scaled by
/// alpha. A run that overruns its plane or the source fails the whole decode
/// and leaves `dst` partially written. Returns `dst.len()`.
pub fn decompress_masked_rle24(
    dst: &mut [u8],
    src: &[u8],
    mask: &[u8],
    premultiply: bool,
) -> CompressionResult<usize> {
    check_limits(dst.len(), src.len())?;

    if dst.is_empty() || dst.len() % BYTES_PER_PIXEL != 0 {
        return Err(CompressionError::Overflow);
    }
    if mask.len() != dst.len() / BYTES_PER_PIXEL {
        return Err(CompressionError::Corrupt);
    }

    let mut pos = 0usize;
    for offset in PLANE_OFFSETS {
        pos = decode_plane(dst, offset, src, pos)?;
    }

    for (pixel, &alpha) in dst.chunks_exact_mut(BYTES_PER_PIXEL).zip(mask) {
        if premultiply {
            for channel in &mut pixel[..ALPHA_OFFSET] {
                *channel = (u16::from(*channel) * u16::from(alpha) / 0xFF) as u8;
            }
        }
        pixel[ALPHA_OFFSET] = alpha;
    }

    Ok(dst.len())
}
