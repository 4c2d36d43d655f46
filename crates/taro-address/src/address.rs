//! Receive addresses and the parameters used to query them.

use crate::asset::{AssetId, AssetType, Genesis};
use crate::keys::{KeyDescriptor, PubKey, TweakedScriptKey};
use crate::AddrError;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::PublicKey;
use bitcoin::taproot::TapNodeHash;
use bitcoin::{Network, XOnlyPublicKey};
use chrono::{DateTime, Utc};

/// A Taro address: everything a sender needs to fund a receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taro {
    /// Address format version.
    pub version: u8,
    /// Genesis of the asset to receive.
    pub genesis: Genesis,
    /// Family key, present iff the asset belongs to a key-linked family.
    pub family_key: Option<PubKey>,
    /// Tweaked key the received asset will be locked to.
    pub script_key: PublicKey,
    /// Taproot internal key of the anchor output.
    pub internal_key: PublicKey,
    /// Amount of the asset to receive.
    pub amount: u64,
    pub network: Network,
}

impl Taro {
    pub fn asset_id(&self) -> AssetId {
        self.genesis.asset_id()
    }

    pub fn asset_type(&self) -> AssetType {
        self.genesis.asset_type
    }
}

/// An address together with the key material needed to spend what it receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrWithKeyInfo {
    pub taro: Taro,
    /// How the script key was derived.
    pub script_key_tweak: TweakedScriptKey,
    /// Derivation info of the taproot internal key.
    pub internal_key_desc: KeyDescriptor,
    /// Final x-only key the funding output pays to.
    pub taproot_output_key: XOnlyPublicKey,
    pub creation_time: DateTime<Utc>,
    /// Set once the wallet started tracking the address.
    pub managed_from: Option<DateTime<Utc>>,
}

impl AddrWithKeyInfo {
    pub fn is_managed(&self) -> bool {
        self.managed_from.is_some()
    }
}

/// Filters for listing addresses.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    /// Only addresses created at or after this time.
    pub created_after: Option<DateTime<Utc>>,
    /// Only addresses created at or before this time. Unbounded if unset.
    pub created_before: Option<DateTime<Utc>>,
    /// Maximum number of addresses, `None` or zero means unlimited.
    pub limit: Option<u32>,
    /// Number of matching addresses to skip.
    pub offset: u32,
    /// Only addresses the wallet is not tracking yet.
    pub unmanaged_only: bool,
}

/// Computes the tapscript root committed to by an address's anchor output.
pub trait TapCommitter: Send + Sync {
    /// Returns the root of the asset commitment of `addr`, optionally combined
    /// with a tapscript sibling.
    fn tapscript_root(
        &self,
        addr: &AddrWithKeyInfo,
        sibling: Option<&TapNodeHash>,
    ) -> Result<TapNodeHash, AddrError>;
}

/// Commits to the single asset an address expects to receive.
///
/// The leaf is a tagged hash over the address version, asset ID, family key,
/// script key and amount. A sibling, if any, is combined as a tap branch.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssetLeafCommitter;

impl AssetLeafCommitter {
    fn asset_leaf(taro: &Taro) -> TapNodeHash {
        let mut preimage = Vec::with_capacity(1 + 32 + 33 + 33 + 8);
        preimage.push(taro.version);
        preimage.extend_from_slice(taro.asset_id().as_bytes());
        if let Some(family_key) = &taro.family_key {
            preimage.extend_from_slice(&family_key.serialize());
        }
        preimage.extend_from_slice(&taro.script_key.serialize());
        preimage.extend_from_slice(&taro.amount.to_be_bytes());
        TapNodeHash::hash(&preimage)
    }
}

impl TapCommitter for AssetLeafCommitter {
    fn tapscript_root(
        &self,
        addr: &AddrWithKeyInfo,
        sibling: Option<&TapNodeHash>,
    ) -> Result<TapNodeHash, AddrError> {
        let leaf = Self::asset_leaf(&addr.taro);
        Ok(match sibling {
            Some(sibling) => TapNodeHash::from_node_hashes(leaf, *sibling),
            None => leaf,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyLocator;
    use bitcoin::secp256k1::{Secp256k1, SecretKey};
    use bitcoin::{OutPoint, Txid};

    fn key(byte: u8) -> PublicKey {
        let secp = Secp256k1::new();
        PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[byte; 32]).unwrap())
    }

    fn addr() -> AddrWithKeyInfo {
        let internal_key = key(2);
        AddrWithKeyInfo {
            taro: Taro {
                version: 0,
                genesis: Genesis {
                    first_prev_out: OutPoint::new(Txid::from_byte_array([9u8; 32]), 1),
                    tag: "asset".into(),
                    metadata: vec![],
                    output_index: 0,
                    asset_type: AssetType::Normal,
                },
                family_key: None,
                script_key: key(1),
                internal_key,
                amount: 100,
                network: Network::Regtest,
            },
            script_key_tweak: TweakedScriptKey {
                raw_key: KeyDescriptor {
                    locator: KeyLocator::default(),
                    pub_key: key(3),
                },
                tweak: vec![],
            },
            internal_key_desc: KeyDescriptor {
                locator: KeyLocator::default(),
                pub_key: internal_key,
            },
            taproot_output_key: internal_key.x_only_public_key().0,
            creation_time: Utc::now(),
            managed_from: None,
        }
    }

    #[test]
    fn sibling_changes_the_tapscript_root() {
        let addr = addr();
        let committer = AssetLeafCommitter;

        let plain = committer.tapscript_root(&addr, None).unwrap();
        assert_eq!(plain, committer.tapscript_root(&addr, None).unwrap());

        let sibling = TapNodeHash::from_byte_array([5u8; 32]);
        let with_sibling = committer.tapscript_root(&addr, Some(&sibling)).unwrap();
        assert_ne!(plain, with_sibling);
        assert_eq!(with_sibling, TapNodeHash::from_node_hashes(plain, sibling));
    }

    #[test]
    fn amount_is_committed() {
        let addr = addr();
        let mut other = addr.clone();
        other.taro.amount += 1;

        let committer = AssetLeafCommitter;
        assert_ne!(
            committer.tapscript_root(&addr, None).unwrap(),
            committer.tapscript_root(&other, None).unwrap()
        );
    }
}
