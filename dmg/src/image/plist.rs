//! Property list collaborator
//!
//! The embedded XML property list is not parsed here. A caller-supplied
//! parser walks `resource-fork` → `blkx` and returns the decoded `Data`
//! value of every entry, which this crate then parses as a block table.

use alloc::vec::Vec;

use crate::error::Result;

/// Extracts the raw block tables from an image's property list
pub trait ResourceForkParser {
    /// Return the `mish` payload of every `blkx` entry, in list order
    ///
    /// `plist` is already decompressed. An error aborts image
    /// initialization with that error.
    fn block_tables(&self, plist: &[u8]) -> Result<Vec<Vec<u8>>>;
}

impl<F> ResourceForkParser for F
where
    F: Fn(&[u8]) -> Result<Vec<Vec<u8>>>,
{
    fn block_tables(&self, plist: &[u8]) -> Result<Vec<Vec<u8>>> {
        self(plist)
    }
}
