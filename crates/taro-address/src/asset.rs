//! Asset genesis information.

use crate::AddrError;
use bitcoin::OutPoint;
use bitcoin::hashes::{Hash, HashEngine, sha256};

/// Type of an asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AssetType {
    /// Fungible asset.
    #[default]
    Normal = 0,
    /// Unique, non-fungible asset.
    Collectible = 1,
}

impl AssetType {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<i64> for AssetType {
    type Error = AddrError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Collectible),
            other => Err(AddrError::InvalidAssetType(other)),
        }
    }
}

/// Unique identifier of an asset, derived from its genesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(pub [u8; 32]);

impl AssetId {
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Genesis of an asset: the outpoint spent to mint it plus its static metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Genesis {
    /// First previous output spent by the genesis transaction.
    pub first_prev_out: OutPoint,
    /// Human-readable asset tag.
    pub tag: String,
    /// Opaque metadata committed to at genesis.
    pub metadata: Vec<u8>,
    /// Index of the genesis transaction output carrying the asset.
    pub output_index: u32,
    pub asset_type: AssetType,
}

impl Genesis {
    /// Computes the asset ID.
    ///
    /// `sha256(first_prev_out || sha256(tag) || sha256(metadata) || output_index || type)`
    pub fn asset_id(&self) -> AssetId {
        let mut engine = sha256::Hash::engine();
        engine.input(&bitcoin::consensus::encode::serialize(&self.first_prev_out));
        engine.input(sha256::Hash::hash(self.tag.as_bytes()).as_byte_array());
        engine.input(sha256::Hash::hash(&self.metadata).as_byte_array());
        engine.input(&self.output_index.to_be_bytes());
        engine.input(&[self.asset_type.code()]);
        AssetId(sha256::Hash::from_engine(engine).to_byte_array())
    }
}
