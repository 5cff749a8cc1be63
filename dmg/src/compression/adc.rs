//! Apple Data Compression (DMG `ADC` chunks)
//!
//! Three token shapes, selected by the high bits of the first byte:
//! - `1LLLLLLL`: `L + 1` literal bytes follow
//! - `01LLLLLL OOOOOOOO OOOOOOOO`: copy `L + 4` bytes from `O + 1` back
//! - `00LLLLOO OOOOOOOO`: copy `L + 3` bytes from `O + 1` back

use super::{check_limits, copy_match, CompressionError, CompressionResult};

/// Decompress an ADC stream into `dst`, returning the number of bytes written
pub fn decompress_adc(dst: &mut [u8], src: &[u8]) -> CompressionResult<usize> {
    check_limits(dst.len(), src.len())?;

    let mut pos = 0usize;
    let mut out = 0usize;
    let byte = |i: usize| -> CompressionResult<usize> {
        src.get(i)
            .copied()
            .map(usize::from)
            .ok_or(CompressionError::Truncated)
    };

    while pos < src.len() {
        let token = byte(pos)?;

        if token & 0x80 != 0 {
            let len = (token & 0x7F) + 1;
            let literals = src
                .get(pos + 1..pos + 1 + len)
                .ok_or(CompressionError::Truncated)?;
            dst.get_mut(out..out + len)
                .ok_or(CompressionError::Overflow)?
                .copy_from_slice(literals);
            pos += 1 + len;
            out += len;
        } else if token & 0x40 != 0 {
            let len = (token & 0x3F) + 4;
            let offset = (byte(pos + 1)? << 8) | byte(pos + 2)?;
            copy_match(dst, out, offset + 1, len)?;
            pos += 3;
            out += len;
        } else {
            let len = ((token >> 2) & 0x0F) + 3;
            let offset = ((token & 0x03) << 8) | byte(pos + 1)?;
            copy_match(dst, out, offset + 1, len)?;
            pos += 2;
            out += len;
        }
    }

    Ok(out)
}
