//! Key material referenced by addresses.

use crate::AddrError;
use bitcoin::secp256k1::PublicKey;

/// Length of a compressed public key.
pub const PUB_KEY_LEN: usize = 33;

/// A compressed public key as persisted on disk.
///
/// The all-zero 33 byte encoding is not a point on the curve. Addresses created
/// before family keys existed carry it as a placeholder, so it decodes to
/// [`PubKey::Empty`] instead of failing. Any other encoding must be a valid point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PubKey {
    /// Legacy placeholder, serialized as 33 zero bytes.
    Empty,
    /// A valid curve point.
    Point(PublicKey),
}

impl PubKey {
    /// Parses a compressed public key, accepting the all-zero placeholder.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddrError> {
        if bytes.len() != PUB_KEY_LEN {
            return Err(AddrError::InvalidKeyLength {
                expected: PUB_KEY_LEN,
                actual: bytes.len(),
            });
        }

        if bytes.iter().all(|byte| *byte == 0) {
            return Ok(Self::Empty);
        }

        Ok(Self::Point(PublicKey::from_slice(bytes)?))
    }

    /// Returns the 33 byte compressed encoding.
    pub fn serialize(&self) -> [u8; PUB_KEY_LEN] {
        match self {
            Self::Empty => [0u8; PUB_KEY_LEN],
            Self::Point(key) => key.serialize(),
        }
    }

    /// Returns the underlying point, `None` for the placeholder.
    pub fn as_point(&self) -> Option<&PublicKey> {
        match self {
            Self::Empty => None,
            Self::Point(key) => Some(key),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<PublicKey> for PubKey {
    fn from(key: PublicKey) -> Self {
        Self::Point(key)
    }
}

/// Locates a key within the wallet's key derivation scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyLocator {
    /// Key family.
    pub family: u32,
    /// Index within the family.
    pub index: u32,
}

/// A public key together with the locator it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyDescriptor {
    pub locator: KeyLocator,
    pub pub_key: PublicKey,
}

/// A script key tweak: the raw internal key plus the tweak applied to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TweakedScriptKey {
    /// Key before the tweak is applied.
    pub raw_key: KeyDescriptor,
    /// Opaque tweak bytes, empty if the script key is the raw key.
    pub tweak: Vec<u8>,
}
