//! RSA public keys

use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
use sha2::Sha256;

use super::{RSA2048_SIZE, SHA256_DIGEST_SIZE};
use crate::error::{Error, Result};
use crate::utils::endian::{read_le_u16, read_le_u64};

/// Size of the OpenCore key header (`num_qwords`, reserved, `n0inv`)
const OC_KEY_HEADER_SIZE: usize = 16;

/// 64-bit words per 2048-bit number
const OC_KEY_QWORDS: u16 = (RSA2048_SIZE / 8) as u16;

/// RSA-2048 public key used to check chunklist signatures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: RsaPublicKey,
}

impl PublicKey {
    /// Exponent of every Apple and OpenCore key
    pub const DEFAULT_EXPONENT: u32 = 65_537;

    /// Build a key from a 256-byte big-endian modulus and an exponent
    pub fn from_modulus(modulus: &[u8], exponent: u32) -> Result<Self> {
        if modulus.len() != RSA2048_SIZE {
            log::debug!("RSA modulus is {} bytes, expected {}", modulus.len(), RSA2048_SIZE);
            return Err(Error::InvalidParameter);
        }
        Self::from_biguint(BigUint::from_bytes_be(modulus), exponent)
    }

    /// Parse an OpenCore binary key (`OC_RSA_PUBLIC_KEY`)
    ///
    /// Layout, little-endian: `num_qwords: u16`, 6 reserved bytes,
    /// `n0inv: u64`, then the modulus and R^2 mod N as `num_qwords` 64-bit
    /// words each. Only 2048-bit keys with exponent 65537 are accepted. The
    /// Montgomery constant is checked against the modulus; R^2 is not used.
    pub fn from_oc_blob(blob: &[u8]) -> Result<Self> {
        let header = blob.get(..OC_KEY_HEADER_SIZE).ok_or(Error::InvalidParameter)?;
        let num_qwords = read_le_u16(header, 0).ok_or(Error::InvalidParameter)?;
        if num_qwords != OC_KEY_QWORDS {
            log::debug!("OC key has {} qwords, only 2048-bit keys are supported", num_qwords);
            return Err(Error::Unsupported);
        }
        if header[2..8].iter().any(|&b| b != 0) {
            return Err(Error::Unsupported);
        }
        let n0inv = read_le_u64(header, 8).ok_or(Error::InvalidParameter)?;

        // Modulus followed by R^2 mod N
        if blob.len() < OC_KEY_HEADER_SIZE + 2 * RSA2048_SIZE {
            return Err(Error::InvalidParameter);
        }
        let modulus = &blob[OC_KEY_HEADER_SIZE..OC_KEY_HEADER_SIZE + RSA2048_SIZE];

        let n_low = read_le_u64(modulus, 0).ok_or(Error::InvalidParameter)?;
        if n0inv.wrapping_mul(n_low) != u64::MAX {
            log::debug!("OC key Montgomery inverse does not match modulus");
            return Err(Error::InvalidParameter);
        }

        Self::from_biguint(BigUint::from_bytes_le(modulus), Self::DEFAULT_EXPONENT)
    }

    fn from_biguint(modulus: BigUint, exponent: u32) -> Result<Self> {
        if modulus.bits() != RSA2048_SIZE * 8 {
            log::debug!("RSA modulus is {} bits", modulus.bits());
            return Err(Error::InvalidParameter);
        }
        let inner = RsaPublicKey::new(modulus, BigUint::from(exponent))
            .map_err(|_| Error::InvalidParameter)?;
        Ok(Self { inner })
    }

    /// Modulus size in bytes
    pub fn size(&self) -> usize {
        self.inner.size()
    }

    /// Check a big-endian PKCS#1 v1.5 signature over a SHA-256 digest
    pub fn verify_sha256(&self, digest: &[u8; SHA256_DIGEST_SIZE], signature: &[u8]) -> bool {
        self.inner
            .verify(Pkcs1v15Sign::new::<Sha256>(), digest, signature)
            .is_ok()
    }
}
