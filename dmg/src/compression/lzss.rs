//! LZSS (Okumura variant used by Apple kernel caches)
//!
//! Token stream layout:
//! - A control byte announces the next eight tokens, least significant bit
//!   first. A set bit is a literal byte, a clear bit a back-reference.
//! - A back-reference is two bytes `pppppppp PPPPLLLL`: a 12-bit absolute
//!   ring position `P:p` and a length `L + 3`.
//! - The 4096-byte ring starts filled with spaces and the first byte is
//!   written at `N - F`.

use alloc::vec::Vec;

use super::{check_limits, CompressionError, CompressionResult};

/// Ring buffer size
const N: usize = 4096;
/// Longest match
const F: usize = 18;
/// Matches of this length or shorter are sent as literals
const THRESHOLD: usize = 2;

/// Hash buckets for the encoder's match finder
const HASH_SIZE: usize = 1 << 12;
/// Chain steps before the encoder settles for the best match so far
const MAX_CHAIN: usize = 128;
const NIL: usize = usize::MAX;

/// Decompress an LZSS token stream into `dst`
///
/// The stream ends when `src` is exhausted at a token boundary. Returns the
/// number of bytes written.
pub fn decompress_lzss(dst: &mut [u8], src: &[u8]) -> CompressionResult<usize> {
    check_limits(dst.len(), src.len())?;

    let mut ring = [b' '; N];
    let mut r = N - F;
    let mut out = 0usize;
    let mut input = src.iter().copied();
    let mut flags: u32 = 0;

    loop {
        flags >>= 1;
        if flags & 0x100 == 0 {
            match input.next() {
                Some(control) => flags = u32::from(control) | 0xFF00,
                None => break,
            }
        }

        if flags & 1 != 0 {
            let Some(byte) = input.next() else { break };
            *dst.get_mut(out).ok_or(CompressionError::Overflow)? = byte;
            out += 1;
            ring[r] = byte;
            r = (r + 1) & (N - 1);
        } else {
            let Some(low) = input.next() else { break };
            let high = input.next().ok_or(CompressionError::Truncated)?;
            let pos = usize::from(low) | (usize::from(high & 0xF0) << 4);
            let len = usize::from(high & 0x0F) + THRESHOLD + 1;

            if dst.len() - out < len {
                return Err(CompressionError::Overflow);
            }
            for k in 0..len {
                let byte = ring[(pos + k) & (N - 1)];
                dst[out] = byte;
                out += 1;
                ring[r] = byte;
                r = (r + 1) & (N - 1);
            }
        }
    }

    Ok(out)
}

/// Compress `src` into `dst` using the LZSS token format
///
/// Matches are found with hash chains over the last `N - F` bytes of input,
/// so the output decodes with [`decompress_lzss`] but is not byte-identical
/// to Apple's tree-based encoder. Returns the number of bytes written.
pub fn compress_lzss(dst: &mut [u8], src: &[u8]) -> CompressionResult<usize> {
    check_limits(dst.len(), src.len())?;

    let mut writer = TokenWriter::new(dst);
    let mut finder = MatchFinder::new()?;
    let mut pos = 0usize;

    while pos < src.len() {
        let (distance, len) = finder.longest_match(src, pos);

        if len > THRESHOLD {
            let ring_pos = (N - F + pos - distance) & (N - 1);
            writer.reference(ring_pos, len)?;
            for p in pos..pos + len {
                finder.insert(src, p);
            }
            pos += len;
        } else {
            writer.literal(src[pos])?;
            finder.insert(src, pos);
            pos += 1;
        }
    }

    writer.finish()
}

/// Hash-chain index over recent input positions
struct MatchFinder {
    head: Vec<usize>,
    prev: Vec<usize>,
}

impl MatchFinder {
    fn new() -> CompressionResult<Self> {
        let mut head = Vec::new();
        let mut prev = Vec::new();
        head.try_reserve_exact(HASH_SIZE)
            .map_err(|_| CompressionError::OutOfMemory)?;
        prev.try_reserve_exact(N)
            .map_err(|_| CompressionError::OutOfMemory)?;
        head.resize(HASH_SIZE, NIL);
        prev.resize(N, NIL);
        Ok(Self { head, prev })
    }

    fn hash(src: &[u8], pos: usize) -> Option<usize> {
        let key = src.get(pos..pos + THRESHOLD + 1)?;
        let value = (usize::from(key[0]) << 8) ^ (usize::from(key[1]) << 4) ^ usize::from(key[2]);
        Some(value & (HASH_SIZE - 1))
    }

    fn insert(&mut self, src: &[u8], pos: usize) {
        if let Some(h) = Self::hash(src, pos) {
            self.prev[pos & (N - 1)] = self.head[h];
            self.head[h] = pos;
        }
    }

    /// Best `(distance, length)` for the bytes at `pos`
    ///
    /// Distances are capped at `N - F` so the referenced ring slots are never
    /// overwritten while the decoder copies the match.
    fn longest_match(&self, src: &[u8], pos: usize) -> (usize, usize) {
        let Some(h) = Self::hash(src, pos) else {
            return (0, 0);
        };
        let max_len = F.min(src.len() - pos);
        let mut best = (0, 0);
        let mut candidate = self.head[h];
        let mut steps = 0;

        while candidate != NIL && candidate < pos && steps < MAX_CHAIN {
            let distance = pos - candidate;
            if distance > N - F {
                break;
            }
            let len = src[candidate..]
                .iter()
                .zip(&src[pos..pos + max_len])
                .take_while(|(a, b)| a == b)
                .count();
            if len > best.1 {
                best = (distance, len);
                if len == max_len {
                    break;
                }
            }
            let next = self.prev[candidate & (N - 1)];
            if next >= candidate {
                break;
            }
            candidate = next;
            steps += 1;
        }

        best
    }
}

/// Groups tokens under their control byte
struct TokenWriter<'a> {
    dst: &'a mut [u8],
    out: usize,
    code: [u8; 17],
    code_len: usize,
    mask: u8,
}

impl<'a> TokenWriter<'a> {
    fn new(dst: &'a mut [u8]) -> Self {
        Self {
            dst,
            out: 0,
            code: [0; 17],
            code_len: 1,
            mask: 1,
        }
    }

    fn literal(&mut self, byte: u8) -> CompressionResult<()> {
        self.code[0] |= self.mask;
        self.code[self.code_len] = byte;
        self.code_len += 1;
        self.advance()
    }

    fn reference(&mut self, ring_pos: usize, len: usize) -> CompressionResult<()> {
        self.code[self.code_len] = ring_pos as u8;
        self.code[self.code_len + 1] =
            (((ring_pos >> 4) & 0xF0) as u8) | (len - (THRESHOLD + 1)) as u8;
        self.code_len += 2;
        self.advance()
    }

    fn advance(&mut self) -> CompressionResult<()> {
        self.mask = self.mask.wrapping_shl(1);
        if self.mask == 0 {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> CompressionResult<()> {
        let end = self.out + self.code_len;
        let out = self.dst.get_mut(self.out..end).ok_or(CompressionError::Overflow)?;
        out.copy_from_slice(&self.code[..self.code_len]);
        self.out = end;
        self.code[0] = 0;
        self.code_len = 1;
        self.mask = 1;
        Ok(())
    }

    fn finish(mut self) -> CompressionResult<usize> {
        if self.code_len > 1 {
            self.flush()?;
        }
        Ok(self.out)
    }
}
