//! Bounds-checked integer reads
//!
//! Every structure in this crate is parsed from untrusted bytes. A read that
//! would run past the slice yields `None`.

#[inline]
fn field<const N: usize>(data: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    data.get(offset..end)?.try_into().ok()
}

/// Read a big-endian u32
#[inline]
pub fn read_be_u32(data: &[u8], offset: usize) -> Option<u32> {
    field(data, offset).map(u32::from_be_bytes)
}

/// Read a big-endian u64
#[inline]
pub fn read_be_u64(data: &[u8], offset: usize) -> Option<u64> {
    field(data, offset).map(u64::from_be_bytes)
}

/// Read a little-endian u16
#[inline]
pub fn read_le_u16(data: &[u8], offset: usize) -> Option<u16> {
    field(data, offset).map(u16::from_le_bytes)
}

/// Read a little-endian u32
#[inline]
pub fn read_le_u32(data: &[u8], offset: usize) -> Option<u32> {
    field(data, offset).map(u32::from_le_bytes)
}

/// Read a little-endian u64
#[inline]
pub fn read_le_u64(data: &[u8], offset: usize) -> Option<u64> {
    field(data, offset).map(u64::from_le_bytes)
}

/// Borrow a fixed-size array
#[inline]
pub fn read_array<const N: usize>(data: &[u8], offset: usize) -> Option<&[u8; N]> {
    let end = offset.checked_add(N)?;
    data.get(offset..end)?.try_into().ok()
}

/// Borrow `len` bytes starting at a 64-bit offset
///
/// Both values come straight from on-disk fields, so the conversion to
/// `usize` and the addition are checked.
pub fn sub_slice(data: &[u8], offset: u64, len: u64) -> Option<&[u8]> {
    let start = usize::try_from(offset).ok()?;
    let len = usize::try_from(len).ok()?;
    data.get(start..start.checked_add(len)?)
}
