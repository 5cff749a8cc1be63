//! Cryptographic primitives for image authentication
//!
//! SHA-256 digests and RSA-2048 PKCS#1 v1.5 signature checks. Keys are
//! supplied by the caller; nothing here is secret.

mod key;

pub use key::PublicKey;

use sha2::{Digest, Sha256};

/// SHA-256 digest size in bytes
pub const SHA256_DIGEST_SIZE: usize = 32;

/// RSA-2048 signature and modulus size in bytes
pub const RSA2048_SIZE: usize = 256;

/// SHA-256 of a buffer
pub fn sha256(data: &[u8]) -> [u8; SHA256_DIGEST_SIZE] {
    Sha256::digest(data).into()
}
