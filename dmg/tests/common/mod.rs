//! Common test utilities: image builder, static plist parser, signing key
//! and a recording block device host

#![allow(dead_code)]

pub mod builder;
pub use builder::{BuiltImage, ImageBuilder};

use dmg::chunklist::{ChunkEntry, ChunklistHeader};
use dmg::crypto::sha256;
use dmg::image::{BlockDeviceHost, BlockIoMedia, ResourceForkParser};
use dmg::{Error, PublicKey, Result};
use rsa::{BigUint, Pkcs1v15Sign, RsaPrivateKey};
use sha2::Sha256;

/// Hands back fixed block tables, checking it was given the expected plist
pub struct StaticParser {
    pub plist: Vec<u8>,
    pub tables: Vec<Vec<u8>>,
}

impl StaticParser {
    pub fn for_image(image: &BuiltImage) -> Self {
        Self {
            plist: image.plist.clone(),
            tables: image.tables.clone(),
        }
    }
}

impl ResourceForkParser for StaticParser {
    fn block_tables(&self, plist: &[u8]) -> Result<Vec<Vec<u8>>> {
        if plist != self.plist.as_slice() {
            return Err(Error::InvalidParameter);
        }
        Ok(self.tables.clone())
    }
}

/// Host that records installs and uninstalls
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub next_handle: u32,
    pub installed: Vec<(u32, BlockIoMedia)>,
    pub uninstalled: Vec<u32>,
    pub refuse_install: bool,
}

impl BlockDeviceHost for RecordingHost {
    type Handle = u32;

    fn install(&mut self, media: &BlockIoMedia) -> Result<u32> {
        if self.refuse_install {
            return Err(Error::OutOfResources);
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.installed.push((handle, media.clone()));
        Ok(handle)
    }

    fn uninstall(&mut self, handle: u32) -> Result<()> {
        self.installed.retain(|(h, _)| *h != handle);
        self.uninstalled.push(handle);
        Ok(())
    }
}

const MODULUS_HEX: &[&str] = &[
    "bf6e9a15b27ceffbfc18671304d42ec6cb4dc1b3f7fe3b2a094e5eac6ceee33d",
    "8feed9cb98e16e9e0d0673c834053fdba21111411399131d272784fe8cb70662",
    "e8d8bb06db3afc76450f52dc550fafa3e24f09e503b5b2e908fb42ff57685f75",
    "13efa28e2cd0d4f9f9ef276ad0bff132d341b1790ad60c1be3b4c75dd842eb86",
    "8f26473a7baf4ce4957a04c28a0838fad9c2615973fff2447b7a0816edf0a97e",
    "cff446bcdf67f12deb979fe4b0b5ff9e6604f8a89ed5fd07e69bda911aabeb61",
    "7ce41bbec048eb61a9994f0cb54bf9d1f26559dae549f9652ff8d8fa23ac7d10",
    "4bf01b04a49874895e8d752f54f76042eefa8c6aab79c7be6d753b48f29e27fb",
];

const PRIVATE_EXPONENT_HEX: &[&str] = &[
    "4ed292bd865ded4edb718cd786f07b463da609b139d6c3b3be5b379e55c85367",
    "20e1df69f6cc3408fe21ff009b72e1e564a9146ab050224fa9b49b0d59116f9e",
    "c073a526e0943c29d2abc99991a8c0d08139bc404133cab42b8f91f9a39b055b",
    "26d7501eac935c6e859c14a5e5c872df539f441d2bfa10c8570d33de0f5316b8",
    "fd3f156de1987b4983a02aeabaf19febe8140fc87f2365e0870fca63d2888b82",
    "d8887eb5b8cd756ab61ef5004d10f80e141916a1aa677cc7b576e949fb520b17",
    "ff095df942af5fd93d99bcb78285ed82101d3198f80d5cd81423bdc6760007b6",
    "d1397906625616fbbbc964cd8e0fa1d74c5196c32551b2be80fb5495bf2e2579",
];

const PRIME_P_HEX: &[&str] = &[
    "f08cd1c15309cdec942bed636b2d2710c5b0d8677523fac64834f4076bd92ed1",
    "e1c2230e62a54a48b927f74f890dbade1fc8636451de8dfddd12fbee81338977",
    "e145c010f5acd260a551850bd12741f65b90b805d3496837505584201cd58469",
    "66bb22524d069803a9efdb01b34e7c8c1d330fa11a6d12d6fdc5e1b7f25be6df",
];

const PRIME_Q_HEX: &[&str] = &[
    "cbba2c1a62c98e64eecca61ea3f1280abb56d6443a3a746570c01e040ef290da",
    "11684e7220b56ce1d7d4d2f78d054b642f5ccd7a673be1006f305507e4abe6ad",
    "e3362f1aaa26493f6d014087535f17028e0b1e08047afe9fa86868f89d381495",
    "16db9a995273b0c5646c43fb6b5d823a9b9ed600d85a81c4beedeb4aab202e65",
];

fn biguint(parts: &[&str]) -> BigUint {
    BigUint::parse_bytes(parts.concat().as_bytes(), 16).unwrap()
}

/// Fixed 2048-bit signing key
pub fn signing_key() -> RsaPrivateKey {
    RsaPrivateKey::from_components(
        biguint(MODULUS_HEX),
        BigUint::from(65_537u32),
        biguint(PRIVATE_EXPONENT_HEX),
        vec![biguint(PRIME_P_HEX), biguint(PRIME_Q_HEX)],
    )
    .unwrap()
}

/// Public half of [`signing_key`]
pub fn trusted_key() -> PublicKey {
    let modulus = hex::decode(MODULUS_HEX.concat()).unwrap();
    PublicKey::from_modulus(&modulus, PublicKey::DEFAULT_EXPONENT).unwrap()
}

/// A 2048-bit key that did not sign anything
pub fn untrusted_key() -> PublicKey {
    let mut modulus = hex::decode(MODULUS_HEX.concat()).unwrap();
    modulus[255] ^= 0x02;
    PublicKey::from_modulus(&modulus, PublicKey::DEFAULT_EXPONENT).unwrap()
}

/// Chunklist over `data` split into `chunk_size` pieces, signed with
/// [`signing_key`]
pub fn build_chunklist(data: &[u8], chunk_size: usize) -> Vec<u8> {
    let chunks: Vec<&[u8]> = data.chunks(chunk_size).collect();
    let count = chunks.len() as u64;
    let chunk_offset = ChunklistHeader::SIZE as u64;
    let sig_offset = chunk_offset + count * ChunkEntry::SIZE as u64;

    let mut out = Vec::new();
    out.extend_from_slice(b"CNKL");
    out.extend_from_slice(&(ChunklistHeader::SIZE as u32).to_le_bytes());
    out.extend_from_slice(&[1, 1, 1, 0]);
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&chunk_offset.to_le_bytes());
    out.extend_from_slice(&sig_offset.to_le_bytes());
    for chunk in &chunks {
        out.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
        out.extend_from_slice(&sha256(chunk));
    }

    let digest = sha256(&out);
    let mut signature = signing_key()
        .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        .unwrap();
    // Stored little-endian
    signature.reverse();
    out.extend_from_slice(&signature);
    out
}
