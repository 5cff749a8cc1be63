//! Utility functions

pub mod checksum;
pub mod endian;
pub mod sector;
