//! Row and parameter types of the address book tables.

/// A raw internal key with its derivation locator.
#[derive(Debug, Clone)]
pub struct InternalKey {
    pub raw_key: Vec<u8>,
    pub key_family: i64,
    pub key_index: i64,
}

/// A tweaked script key referencing its internal key.
#[derive(Debug, Clone)]
pub struct NewScriptKey {
    pub internal_key_id: i64,
    pub tweaked_script_key: Vec<u8>,
    pub tweak: Vec<u8>,
}

/// Genesis asset record keyed by the asset ID.
#[derive(Debug, Clone)]
pub struct NewGenesisAsset {
    pub asset_id: Vec<u8>,
    pub asset_tag: String,
    pub meta_data: Vec<u8>,
    pub output_index: i64,
    pub asset_type: i64,
    pub genesis_point_id: i64,
}

/// Genesis asset joined with its genesis point.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GenesisRow {
    pub prev_out: Vec<u8>,
    pub asset_tag: String,
    pub meta_data: Option<Vec<u8>>,
    pub output_index: i64,
    pub asset_type: i64,
}

/// A new address row, keys already resolved to their IDs.
#[derive(Debug, Clone)]
pub struct NewAddr {
    pub version: i64,
    pub genesis_asset_id: i64,
    pub fam_key: Option<Vec<u8>>,
    pub script_key_id: i64,
    pub taproot_key_id: i64,
    pub taproot_output_key: Vec<u8>,
    pub amount: i64,
    pub asset_type: i64,
    pub creation_time: i64,
}

/// An address joined with its script key and both internal keys.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AddrRow {
    pub version: i64,
    pub genesis_asset_id: i64,
    pub fam_key: Option<Vec<u8>>,
    pub taproot_output_key: Vec<u8>,
    pub amount: i64,
    pub asset_type: i64,
    pub creation_time: i64,
    pub managed_from: Option<i64>,
    pub tweaked_script_key: Vec<u8>,
    pub script_key_tweak: Option<Vec<u8>>,
    pub script_key_raw: Vec<u8>,
    pub script_key_family: i64,
    pub script_key_index: i64,
    pub raw_taproot_key: Vec<u8>,
    pub taproot_key_family: i64,
    pub taproot_key_index: i64,
}

/// Sets the managed-from time of the address with the given output key.
#[derive(Debug, Clone)]
pub struct AddrManaged {
    pub taproot_output_key: Vec<u8>,
    pub managed_from: i64,
}

/// An on-chain transaction, block fields unset while unconfirmed.
#[derive(Debug, Clone)]
pub struct ChainTx {
    pub txid: Vec<u8>,
    pub raw_tx: Vec<u8>,
    pub block_height: Option<i64>,
    pub block_hash: Option<Vec<u8>>,
    pub tx_index: Option<i64>,
}

/// A UTXO believed to fund an address.
#[derive(Debug, Clone)]
pub struct RawManagedUtxo {
    /// Serialized internal key owning the output.
    pub raw_key: Vec<u8>,
    pub outpoint: Vec<u8>,
    pub amt_sats: i64,
    pub tapscript_sibling: Option<Vec<u8>>,
    pub taro_root: Vec<u8>,
    pub txn_id: i64,
}

/// Creates or updates the event of an address for one outpoint.
#[derive(Debug, Clone)]
pub struct UpsertAddrEvent {
    pub taproot_output_key: Vec<u8>,
    pub creation_time: i64,
    /// Raw status code, validated by the storage.
    pub status: i64,
    pub txid: Vec<u8>,
    pub chain_txn_output_index: i64,
    pub managed_utxo_id: i64,
}

/// Moves an existing event to its final status and links the asset proof.
#[derive(Debug, Clone)]
pub struct CompleteAddrEvent {
    pub taproot_output_key: Vec<u8>,
    pub status: i64,
    pub txid: Vec<u8>,
    pub chain_txn_output_index: i64,
    pub asset_proof_id: i64,
    pub asset_id: i64,
}

/// An event joined with its chain transaction and managed UTXO.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AddrEventRow {
    pub id: i64,
    pub creation_time: i64,
    pub status: i64,
    pub txid: Vec<u8>,
    pub output_index: i64,
    pub confirmation_height: Option<i64>,
    pub managed_utxo_id: i64,
    pub amt_sats: i64,
    pub tapscript_sibling: Option<Vec<u8>>,
    pub internal_key: Vec<u8>,
    pub asset_proof_id: Option<i64>,
}

/// An event ID together with the output key of its address.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AddrEventId {
    pub event_id: i64,
    pub taproot_output_key: Vec<u8>,
}

/// Proof of an imported asset.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AssetProof {
    pub proof_id: i64,
    pub asset_id: i64,
    pub proof_file: Vec<u8>,
}

/// An imported asset with its proof.
#[derive(Debug, Clone)]
pub struct NewAssetProof {
    pub genesis_asset_id: i64,
    pub script_key_id: i64,
    pub amount: i64,
    pub proof_file: Vec<u8>,
}
