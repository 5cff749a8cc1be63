//! Adler-32 checksum (RFC 1950)

const MOD_ADLER: u32 = 65_521;

/// Largest number of bytes that can be summed before the 32-bit halves
/// must be reduced
const NMAX: usize = 5552;

/// Incremental Adler-32 state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adler32 {
    low: u32,
    high: u32,
}

impl Adler32 {
    /// Fresh state (checksum of the empty buffer is 1)
    pub const fn new() -> Self {
        Self { low: 1, high: 0 }
    }

    /// Feed more bytes
    pub fn update(&mut self, data: &[u8]) {
        for block in data.chunks(NMAX) {
            for &byte in block {
                self.low += u32::from(byte);
                self.high += self.low;
            }
            self.low %= MOD_ADLER;
            self.high %= MOD_ADLER;
        }
    }

    /// Current checksum value
    pub const fn finish(&self) -> u32 {
        (self.high << 16) | self.low
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Adler-32 of a whole buffer
pub fn adler32(data: &[u8]) -> u32 {
    let mut state = Adler32::new();
    state.update(data);
    state.finish()
}
