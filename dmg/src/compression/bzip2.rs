//! bzip2 (DMG `BZ2` chunks) through libbzip2

use ::bzip2::{Decompress, Status};

use super::{check_limits, CompressionError, CompressionResult};

/// Decompress a complete bzip2 stream into `dst`
///
/// Returns the number of bytes written.
pub fn decompress_bzip2(dst: &mut [u8], src: &[u8]) -> CompressionResult<usize> {
    check_limits(dst.len(), src.len())?;

    let mut stream = Decompress::new(false);
    loop {
        let consumed = stream.total_in() as usize;
        let written = stream.total_out() as usize;
        let input = src.get(consumed..).ok_or(CompressionError::Corrupt)?;
        let output = dst.get_mut(written..).ok_or(CompressionError::Overflow)?;

        let status = stream
            .decompress(input, output)
            .map_err(|_| CompressionError::Corrupt)?;

        if status == Status::StreamEnd {
            return Ok(stream.total_out() as usize);
        }
        if stream.total_in() as usize == consumed && stream.total_out() as usize == written {
            return Err(if written == dst.len() {
                CompressionError::Overflow
            } else {
                CompressionError::Truncated
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::bzip2::{Compress, Compression};

    fn compress(data: &[u8]) -> alloc::vec::Vec<u8> {
        let mut stream = Compress::new(Compression::best(), 0);
        let mut out = alloc::vec![0u8; data.len() + 1024];
        stream
            .compress(data, &mut out, ::bzip2::Action::Finish)
            .unwrap();
        out.truncate(stream.total_out() as usize);
        out
    }

    #[test]
    fn test_roundtrip() {
        let data = b"bzip2 chunk bzip2 chunk bzip2 chunk".repeat(40);
        let packed = compress(&data);
        let mut out = alloc::vec![0u8; data.len()];
        assert_eq!(decompress_bzip2(&mut out, &packed), Ok(data.len()));
        assert_eq!(out, data);
    }

    #[test]
    fn test_short_destination() {
        let data = [0x55u8; 4096];
        let packed = compress(&data);
        let mut out = [0u8; 100];
        assert_eq!(decompress_bzip2(&mut out, &packed), Err(CompressionError::Overflow));
    }

    #[test]
    fn test_garbage_rejected() {
        let mut out = [0u8; 16];
        assert!(decompress_bzip2(&mut out, b"not a bzip2 stream").is_err());
    }

    #[test]
    fn test_oversized_source_rejected() {
        let huge = alloc::vec![0u8; crate::compression::MAX_LENGTH + 1];
        let mut out = [0u8; 16];
        assert_eq!(decompress_bzip2(&mut out, &huge), Err(CompressionError::TooLarge));
    }
}
