//! Key registry: persisting keys as bytes and parsing them back.

use crate::error::{Error, Result};
use crate::queries::AddrBook;
use crate::types::{InternalKey, NewScriptKey};
use bitcoin::XOnlyPublicKey;
use bitcoin::secp256k1::PublicKey;
use taro_address::{KeyDescriptor, KeyLocator, PubKey, TweakedScriptKey};

/// Inserts the key of `desc`, or updates the locator of the known key.
pub(crate) async fn upsert_internal_key<D: AddrBook>(
    db: &mut D,
    desc: &KeyDescriptor,
) -> Result<i64> {
    db.upsert_internal_key(&InternalKey {
        raw_key: desc.pub_key.serialize().to_vec(),
        key_family: i64::from(desc.locator.family),
        key_index: i64::from(desc.locator.index),
    })
    .await
}

/// Inserts a script key together with the internal key it is derived from.
pub(crate) async fn upsert_script_key<D: AddrBook>(
    db: &mut D,
    tweak: &TweakedScriptKey,
    script_key: &PublicKey,
) -> Result<i64> {
    let internal_key_id = upsert_internal_key(db, &tweak.raw_key).await?;

    db.upsert_script_key(&NewScriptKey {
        internal_key_id,
        tweaked_script_key: script_key.serialize().to_vec(),
        tweak: tweak.tweak.clone(),
    })
    .await
}

pub(crate) fn parse_pub_key(what: &'static str, bytes: &[u8]) -> Result<PublicKey> {
    PublicKey::from_slice(bytes).map_err(|err| Error::decode(what, err))
}

pub(crate) fn parse_x_only_key(what: &'static str, bytes: &[u8]) -> Result<XOnlyPublicKey> {
    XOnlyPublicKey::from_slice(bytes).map_err(|err| Error::decode(what, err))
}

/// Parses a family key, the all-zero placeholder decodes to [`PubKey::Empty`].
pub(crate) fn parse_family_key(bytes: Option<&[u8]>) -> Result<Option<PubKey>> {
    bytes
        .map(|bytes| PubKey::from_slice(bytes).map_err(|err| Error::decode("family key", err)))
        .transpose()
}

/// Rebuilds a key descriptor from its stored columns.
pub(crate) fn parse_key_desc(
    what: &'static str,
    raw_key: &[u8],
    family: i64,
    index: i64,
) -> Result<KeyDescriptor> {
    let locator = KeyLocator {
        family: u32::try_from(family).map_err(|err| Error::decode("key family", err))?,
        index: u32::try_from(index).map_err(|err| Error::decode("key index", err))?,
    };

    Ok(KeyDescriptor {
        locator,
        pub_key: parse_pub_key(what, raw_key)?,
    })
}
