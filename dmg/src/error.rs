//! Error types for disk image operations

/// Result type for disk image operations
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur while parsing, verifying or reading a disk image
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Malformed arguments or out-of-range structure fields
    #[error("Invalid parameter")]
    InvalidParameter,

    /// Unrecognised magic, version or compression method
    #[error("Unsupported format or method")]
    Unsupported,

    /// Allocation failed
    #[error("Out of resources")]
    OutOfResources,

    /// Checksum or signature mismatch
    #[error("Data integrity check failed")]
    CompromisedData,

    /// A chunklist chunk hash did not match
    #[error("Chunk {index} failed integrity check")]
    CompromisedChunk {
        /// Index of the first mismatching chunk
        index: usize,
    },

    /// Buffer exhausted while a structure expected more bytes
    #[error("Unexpected end of data")]
    EndOfFile,

    /// Chunk decoding failed during a read
    #[error("Device error")]
    DeviceError,

    /// Write attempted on the read-only image device
    #[error("Device is write protected")]
    WriteProtected,
}

impl Error {
    /// Whether this error reports an integrity failure (checksum, hash or signature)
    pub const fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::CompromisedData | Self::CompromisedChunk { .. })
    }
}

impl From<alloc::collections::TryReserveError> for Error {
    fn from(_: alloc::collections::TryReserveError) -> Self {
        Self::OutOfResources
    }
}
