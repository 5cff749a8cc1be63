//! LZVN decoder
//!
//! Every opcode carries some literal count `L`, match length `M` and match
//! distance `D`. Literals follow the opcode bytes and are copied first, then
//! `M` bytes are copied from `D` bytes back in the output. Opcodes that omit
//! `D` reuse the previous distance.
//!
//! | Opcode                    | Kind    | Bytes | Fields                    |
//! |---------------------------|---------|-------|---------------------------|
//! | `LLMMMDDD` (others)       | `sml_d` | 2     | D = `DDD:byte1`           |
//! | `LLMMM110`                | `pre_d` | 1     | previous D                |
//! | `LLMMM111`                | `lrg_d` | 3     | D = LE u16 of bytes 1..3  |
//! | `101LLMMM`                | `med_d` | 3     | 14-bit D, 5-bit M         |
//! | `1110LLLL` / `0xE0`       | literal | 1 / 2 | L = `LLLL` / byte1 + 16   |
//! | `1111MMMM` / `0xF0`       | match   | 1 / 2 | M = `MMMM` / byte1 + 16   |
//! | `0x06`                    | end     | 8     |                           |
//! | `0x0E`, `0x16`            | nop     | 1     |                           |

use super::{check_limits, copy_match, CompressionError, CompressionResult};

/// End-of-stream opcode plus its seven padding bytes
const EOS_LEN: usize = 8;

enum Opcode {
    /// Literals, then a match
    Copy {
        len: usize,
        literals: usize,
        match_len: usize,
        distance: Option<usize>,
    },
    Nop,
    End,
}

/// Decode `op` and its operand bytes at the head of `src`
fn decode_opcode(src: &[u8]) -> CompressionResult<Opcode> {
    let op = src[0];
    let byte = |i: usize| -> CompressionResult<usize> {
        src.get(i)
            .copied()
            .map(usize::from)
            .ok_or(CompressionError::Truncated)
    };
    let op_l = usize::from(op >> 6);
    let op_m = usize::from((op >> 3) & 7) + 3;

    let opcode = match op {
        0x06 => Opcode::End,
        0x0E | 0x16 => Opcode::Nop,
        0x1E | 0x26 | 0x2E | 0x36 | 0x3E | 0x70..=0x7F | 0xD0..=0xDF => {
            return Err(CompressionError::Corrupt);
        }
        0xA0..=0xBF => {
            let b1 = byte(1)?;
            let b2 = byte(2)?;
            Opcode::Copy {
                len: 3,
                literals: usize::from((op >> 3) & 3),
                match_len: ((usize::from(op & 7) << 2) | (b1 & 3)) + 3,
                distance: Some((b1 >> 2) | (b2 << 6)),
            }
        }
        0xE0 => Opcode::Copy {
            len: 2,
            literals: byte(1)? + 16,
            match_len: 0,
            distance: None,
        },
        0xE1..=0xEF => Opcode::Copy {
            len: 1,
            literals: usize::from(op & 0x0F),
            match_len: 0,
            distance: None,
        },
        0xF0 => Opcode::Copy {
            len: 2,
            literals: 0,
            match_len: byte(1)? + 16,
            distance: None,
        },
        0xF1..=0xFF => Opcode::Copy {
            len: 1,
            literals: 0,
            match_len: usize::from(op & 0x0F),
            distance: None,
        },
        _ if op & 7 == 6 => Opcode::Copy {
            len: 1,
            literals: op_l,
            match_len: op_m,
            distance: None,
        },
        _ if op & 7 == 7 => Opcode::Copy {
            len: 3,
            literals: op_l,
            match_len: op_m,
            distance: Some(byte(1)? | (byte(2)? << 8)),
        },
        _ => Opcode::Copy {
            len: 2,
            literals: op_l,
            match_len: op_m,
            distance: Some((usize::from(op & 7) << 8) | byte(1)?),
        },
    };

    Ok(opcode)
}

/// Decompress an LZVN stream into `dst`
///
/// The stream must end with the end-of-stream opcode after producing exactly
/// `dst.len()` bytes. Returns the number of bytes written.
pub fn decompress_lzvn(dst: &mut [u8], src: &[u8]) -> CompressionResult<usize> {
    check_limits(dst.len(), src.len())?;

    let mut src_pos = 0usize;
    let mut out = 0usize;
    let mut prev_distance = 0usize;

    loop {
        let rest = src.get(src_pos..).filter(|r| !r.is_empty());
        let Some(rest) = rest else {
            return Err(CompressionError::Truncated);
        };

        match decode_opcode(rest)? {
            Opcode::End => {
                if rest.len() < EOS_LEN {
                    return Err(CompressionError::Truncated);
                }
                if out != dst.len() {
                    return Err(CompressionError::Corrupt);
                }
                return Ok(out);
            }
            Opcode::Nop => src_pos += 1,
            Opcode::Copy {
                len,
                literals,
                match_len,
                distance,
            } => {
                src_pos += len;

                if literals > 0 {
                    let lit = src
                        .get(src_pos..src_pos + literals)
                        .ok_or(CompressionError::Truncated)?;
                    let target = dst
                        .get_mut(out..out + literals)
                        .ok_or(CompressionError::Overflow)?;
                    target.copy_from_slice(lit);
                    src_pos += literals;
                    out += literals;
                }

                if let Some(d) = distance {
                    prev_distance = d;
                }
                if match_len > 0 {
                    copy_match(dst, out, prev_distance, match_len)?;
                    out += match_len;
                }
            }
        }
    }
}
