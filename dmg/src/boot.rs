//! Policy-driven image loading
//!
//! Runs the sequence the boot manager applies before it trusts a recovery
//! image: parse the image, then depending on [`LoadPolicy`] require a
//! chunklist, check its signature against trusted keys and verify the image
//! bytes against it.

use crate::chunklist::Chunklist;
use crate::crypto::PublicKey;
use crate::error::{Error, Result};
use crate::image::{DiskImage, ResourceForkParser};

/// How strictly an image must be authenticated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadPolicy {
    /// Refuse images that come without a chunklist
    pub require_signature: bool,
    /// Verify the image bytes against the chunklist when one is present
    pub verify_signature: bool,
    /// Require the chunklist to be signed by one of the trusted keys
    pub require_trusted_key: bool,
}

impl LoadPolicy {
    /// Accept anything that parses
    pub const PERMISSIVE: Self = Self {
        require_signature: false,
        verify_signature: false,
        require_trusted_key: false,
    };

    /// Require a chunklist signed by a trusted key and matching the image
    pub const SECURE: Self = Self {
        require_signature: true,
        verify_signature: true,
        require_trusted_key: true,
    };
}

/// Parse `image` and authenticate it according to `policy`
///
/// The data fork checksum is always verified. A chunklist, when present and
/// the policy asks for verification, must cover the image bytes. With
/// `require_trusted_key` its signature must also match one of
/// `trusted_keys`.
pub fn load_disk_image<'a, P>(
    image: &'a [u8],
    chunklist: Option<&[u8]>,
    policy: LoadPolicy,
    trusted_keys: &[PublicKey],
    parser: &P,
) -> Result<DiskImage<'a>>
where
    P: ResourceForkParser + ?Sized,
{
    let disk = DiskImage::initialize(image, true, parser)?;

    let Some(chunklist) = chunklist else {
        if policy.require_signature {
            log::warn!("Image has no chunklist, refusing to load");
            return Err(Error::CompromisedData);
        }
        log::debug!("Image has no chunklist, loading unauthenticated");
        return Ok(disk);
    };

    if !(policy.verify_signature || policy.require_trusted_key) {
        log::debug!("Chunklist present but policy skips verification");
        return Ok(disk);
    }

    let chunklist = Chunklist::initialize(chunklist).inspect_err(|err| {
        log::debug!("Chunklist rejected: {}", err);
    })?;

    if policy.require_trusted_key {
        let trusted = trusted_keys.iter().any(|key| chunklist.verify_signature(key));
        if !trusted {
            log::warn!("Chunklist is not signed by a trusted key");
            return Err(Error::CompromisedData);
        }
    }

    disk.verify_chunklist(&chunklist).inspect_err(|err| {
        log::warn!("Image does not match its chunklist: {}", err);
    })?;

    log::debug!("Image authenticated against {} chunks", chunklist.header().chunk_count);
    Ok(disk)
}
