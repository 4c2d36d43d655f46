//! Store operations available inside an address book transaction.

use crate::error::Result;
use crate::filters::{AddrQuery, EventQuery};
use crate::sqlite::SqliteTx;
use crate::types::{
    AddrEventId, AddrEventRow, AddrManaged, AddrRow, AssetProof, ChainTx, CompleteAddrEvent,
    GenesisRow, InternalKey, NewAddr, NewAssetProof, NewGenesisAsset, NewScriptKey, RawManagedUtxo, UpsertAddrEvent,
};

/// Columns of an address joined with its keys.
const ADDR_COLUMNS: &str = r#"
    addrs.version, addrs.genesis_asset_id, addrs.fam_key, addrs.taproot_output_key,
    addrs.amount, addrs.asset_type, addrs.creation_time, addrs.managed_from,
    script_keys.tweaked_script_key, script_keys.tweak AS script_key_tweak,
    raw_script_keys.raw_key AS script_key_raw,
    raw_script_keys.key_family AS script_key_family,
    raw_script_keys.key_index AS script_key_index,
    taproot_keys.raw_key AS raw_taproot_key,
    taproot_keys.key_family AS taproot_key_family,
    taproot_keys.key_index AS taproot_key_index
    FROM addrs
    JOIN script_keys ON addrs.script_key_id = script_keys.script_key_id
    JOIN internal_keys raw_script_keys ON script_keys.internal_key_id = raw_script_keys.key_id
    JOIN internal_keys taproot_keys ON addrs.taproot_key_id = taproot_keys.key_id
"#;

/// The operations the address book needs from a transaction handle.
#[async_trait::async_trait]
pub trait AddrBook: Send {
    /// Inserts a genesis outpoint if new, returns its ID.
    async fn upsert_genesis_point(&mut self, prev_out: &[u8]) -> Result<i64>;

    /// Inserts a genesis asset if new, returns its ID.
    async fn upsert_genesis_asset(&mut self, asset: &NewGenesisAsset) -> Result<i64>;

    /// Fetches a genesis asset by its ID.
    async fn fetch_genesis_by_id(&mut self, gen_asset_id: i64) -> Result<Option<GenesisRow>>;

    /// Inserts an internal key if new, otherwise overwrites its locator.
    async fn upsert_internal_key(&mut self, key: &InternalKey) -> Result<i64>;

    /// Inserts a script key if new, otherwise overwrites its internal key and tweak.
    async fn upsert_script_key(&mut self, key: &NewScriptKey) -> Result<i64>;

    async fn insert_addr(&mut self, addr: &NewAddr) -> Result<i64>;

    /// Fetches the addresses matching `query`, in insertion order.
    async fn fetch_addrs(&mut self, query: &AddrQuery) -> Result<Vec<AddrRow>>;

    async fn fetch_addr_by_taproot_output_key(&mut self, key: &[u8]) -> Result<Option<AddrRow>>;

    /// Returns the number of updated addresses.
    async fn set_addr_managed(&mut self, update: &AddrManaged) -> Result<u64>;

    /// Inserts a chain transaction, or fills in its block fields.
    async fn upsert_chain_tx(&mut self, tx: &ChainTx) -> Result<i64>;

    async fn upsert_managed_utxo(&mut self, utxo: &RawManagedUtxo) -> Result<i64>;

    /// Creates or updates the event keyed by (output key, txid, output index).
    async fn upsert_addr_event(&mut self, event: &UpsertAddrEvent) -> Result<i64>;

    /// Returns the ID of the completed event, `None` if no event matches.
    async fn complete_addr_event(&mut self, event: &CompleteAddrEvent) -> Result<Option<i64>>;

    async fn fetch_addr_event(&mut self, id: i64) -> Result<Option<AddrEventRow>>;

    /// Returns the IDs of the events matching `query`, in ascending order.
    async fn query_event_ids(&mut self, query: &EventQuery) -> Result<Vec<AddrEventId>>;

    /// Fetches the proof of the asset locked to the given script key.
    async fn fetch_asset_proof(&mut self, script_key: &[u8]) -> Result<Option<AssetProof>>;

    async fn insert_asset_proof(&mut self, proof: &NewAssetProof) -> Result<AssetProof>;
}

#[async_trait::async_trait]
impl AddrBook for SqliteTx {
    async fn upsert_genesis_point(&mut self, prev_out: &[u8]) -> Result<i64> {
        // The no-op update makes RETURNING yield the existing row.
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO genesis_points (prev_out) VALUES (?)
            ON CONFLICT (prev_out) DO UPDATE SET prev_out = excluded.prev_out
            RETURNING genesis_id
            "#,
        )
        .bind(prev_out)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn upsert_genesis_asset(&mut self, asset: &NewGenesisAsset) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO genesis_assets (
                asset_id, asset_tag, meta_data, output_index, asset_type, genesis_point_id
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (asset_id) DO UPDATE SET asset_id = excluded.asset_id
            RETURNING gen_asset_id
            "#,
        )
        .bind(&asset.asset_id)
        .bind(&asset.asset_tag)
        .bind(&asset.meta_data)
        .bind(asset.output_index)
        .bind(asset.asset_type)
        .bind(asset.genesis_point_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn fetch_genesis_by_id(&mut self, gen_asset_id: i64) -> Result<Option<GenesisRow>> {
        let row = sqlx::query_as::<_, GenesisRow>(
            r#"
            SELECT genesis_points.prev_out, genesis_assets.asset_tag, genesis_assets.meta_data,
                genesis_assets.output_index, genesis_assets.asset_type
            FROM genesis_assets
            JOIN genesis_points ON genesis_assets.genesis_point_id = genesis_points.genesis_id
            WHERE genesis_assets.gen_asset_id = ?
            "#,
        )
        .bind(gen_asset_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn upsert_internal_key(&mut self, key: &InternalKey) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO internal_keys (raw_key, key_family, key_index) VALUES (?, ?, ?)
            ON CONFLICT (raw_key) DO UPDATE SET
                key_family = excluded.key_family,
                key_index = excluded.key_index
            RETURNING key_id
            "#,
        )
        .bind(&key.raw_key)
        .bind(key.key_family)
        .bind(key.key_index)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn upsert_script_key(&mut self, key: &NewScriptKey) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO script_keys (internal_key_id, tweaked_script_key, tweak) VALUES (?, ?, ?)
            ON CONFLICT (tweaked_script_key) DO UPDATE SET
                internal_key_id = excluded.internal_key_id,
                tweak = excluded.tweak
            RETURNING script_key_id
            "#,
        )
        .bind(key.internal_key_id)
        .bind(&key.tweaked_script_key)
        .bind(&key.tweak)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn insert_addr(&mut self, addr: &NewAddr) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO addrs (
                version, genesis_asset_id, fam_key, script_key_id, taproot_key_id,
                taproot_output_key, amount, asset_type, creation_time
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(addr.version)
        .bind(addr.genesis_asset_id)
        .bind(&addr.fam_key)
        .bind(addr.script_key_id)
        .bind(addr.taproot_key_id)
        .bind(&addr.taproot_output_key)
        .bind(addr.amount)
        .bind(addr.asset_type)
        .bind(addr.creation_time)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn fetch_addrs(&mut self, query: &AddrQuery) -> Result<Vec<AddrRow>> {
        let sql = format!(
            r#"
            SELECT {ADDR_COLUMNS}
            WHERE addrs.creation_time >= ?
                AND addrs.creation_time <= ?
                AND (? = 0 OR addrs.managed_from IS NULL)
            ORDER BY addrs.id
            LIMIT ? OFFSET ?
            "#
        );

        let rows = sqlx::query_as::<_, AddrRow>(&sql)
            .bind(query.created_after)
            .bind(query.created_before)
            .bind(query.unmanaged_only)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn fetch_addr_by_taproot_output_key(&mut self, key: &[u8]) -> Result<Option<AddrRow>> {
        let sql = format!("SELECT {ADDR_COLUMNS} WHERE addrs.taproot_output_key = ?");

        let row = sqlx::query_as::<_, AddrRow>(&sql)
            .bind(key)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn set_addr_managed(&mut self, update: &AddrManaged) -> Result<u64> {
        let result = sqlx::query("UPDATE addrs SET managed_from = ? WHERE taproot_output_key = ?")
            .bind(update.managed_from)
            .bind(&update.taproot_output_key)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn upsert_chain_tx(&mut self, tx: &ChainTx) -> Result<i64> {
        // Block fields are only ever filled in, a later unconfirmed report
        // does not clear them.
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO chain_txns (txid, raw_tx, block_height, block_hash, tx_index)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (txid) DO UPDATE SET
                block_height = COALESCE(excluded.block_height, chain_txns.block_height),
                block_hash = COALESCE(excluded.block_hash, chain_txns.block_hash),
                tx_index = COALESCE(excluded.tx_index, chain_txns.tx_index)
            RETURNING txn_id
            "#,
        )
        .bind(&tx.txid)
        .bind(&tx.raw_tx)
        .bind(tx.block_height)
        .bind(&tx.block_hash)
        .bind(tx.tx_index)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn upsert_managed_utxo(&mut self, utxo: &RawManagedUtxo) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO managed_utxos (
                outpoint, amt_sats, internal_key_id, tapscript_sibling, taro_root, txn_id
            ) VALUES (
                ?, ?, (SELECT key_id FROM internal_keys WHERE raw_key = ?), ?, ?, ?
            )
            ON CONFLICT (outpoint) DO UPDATE SET
                amt_sats = excluded.amt_sats,
                tapscript_sibling = excluded.tapscript_sibling,
                taro_root = excluded.taro_root,
                txn_id = excluded.txn_id
            RETURNING utxo_id
            "#,
        )
        .bind(&utxo.outpoint)
        .bind(utxo.amt_sats)
        .bind(&utxo.raw_key)
        .bind(&utxo.tapscript_sibling)
        .bind(&utxo.taro_root)
        .bind(utxo.txn_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn upsert_addr_event(&mut self, event: &UpsertAddrEvent) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO addr_events (
                creation_time, addr_id, status, chain_txn_id, chain_txn_output_index,
                managed_utxo_id
            ) VALUES (
                ?,
                (SELECT id FROM addrs WHERE taproot_output_key = ?),
                ?,
                (SELECT txn_id FROM chain_txns WHERE txid = ?),
                ?, ?
            )
            ON CONFLICT (addr_id, chain_txn_id, chain_txn_output_index) DO UPDATE SET
                status = excluded.status,
                managed_utxo_id = excluded.managed_utxo_id
            RETURNING id
            "#,
        )
        .bind(event.creation_time)
        .bind(&event.taproot_output_key)
        .bind(event.status)
        .bind(&event.txid)
        .bind(event.chain_txn_output_index)
        .bind(event.managed_utxo_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn complete_addr_event(&mut self, event: &CompleteAddrEvent) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE addr_events SET
                status = ?,
                asset_proof_id = ?,
                asset_id = ?
            WHERE addr_id = (SELECT id FROM addrs WHERE taproot_output_key = ?)
                AND chain_txn_id = (SELECT txn_id FROM chain_txns WHERE txid = ?)
                AND chain_txn_output_index = ?
            RETURNING id
            "#,
        )
        .bind(event.status)
        .bind(event.asset_proof_id)
        .bind(event.asset_id)
        .bind(&event.taproot_output_key)
        .bind(&event.txid)
        .bind(event.chain_txn_output_index)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(|(id,)| id))
    }

    async fn fetch_addr_event(&mut self, id: i64) -> Result<Option<AddrEventRow>> {
        let row = sqlx::query_as::<_, AddrEventRow>(
            r#"
            SELECT addr_events.id, addr_events.creation_time, addr_events.status,
                chain_txns.txid, addr_events.chain_txn_output_index AS output_index,
                chain_txns.block_height AS confirmation_height,
                addr_events.managed_utxo_id,
                managed_utxos.amt_sats, managed_utxos.tapscript_sibling,
                internal_keys.raw_key AS internal_key,
                addr_events.asset_proof_id
            FROM addr_events
            JOIN chain_txns ON addr_events.chain_txn_id = chain_txns.txn_id
            JOIN managed_utxos ON addr_events.managed_utxo_id = managed_utxos.utxo_id
            JOIN internal_keys ON managed_utxos.internal_key_id = internal_keys.key_id
            WHERE addr_events.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn query_event_ids(&mut self, query: &EventQuery) -> Result<Vec<AddrEventId>> {
        let rows = sqlx::query_as::<_, AddrEventId>(
            r#"
            SELECT addr_events.id AS event_id, addrs.taproot_output_key
            FROM addr_events
            JOIN addrs ON addr_events.addr_id = addrs.id
            WHERE addr_events.status >= ?
                AND addr_events.status <= ?
                AND addrs.taproot_output_key = COALESCE(?, addrs.taproot_output_key)
            ORDER BY addr_events.id
            "#,
        )
        .bind(query.status_from)
        .bind(query.status_to)
        .bind(&query.addr_taproot_key)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn fetch_asset_proof(&mut self, script_key: &[u8]) -> Result<Option<AssetProof>> {
        let row = sqlx::query_as::<_, AssetProof>(
            r#"
            SELECT asset_proofs.proof_id, asset_proofs.asset_id, asset_proofs.proof_file
            FROM asset_proofs
            JOIN assets ON asset_proofs.asset_id = assets.asset_id
            JOIN script_keys ON assets.script_key_id = script_keys.script_key_id
            WHERE script_keys.tweaked_script_key = ?
            "#,
        )
        .bind(script_key)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn insert_asset_proof(&mut self, proof: &NewAssetProof) -> Result<AssetProof> {
        let (asset_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO assets (genesis_id, script_key_id, amount) VALUES (?, ?, ?)
            RETURNING asset_id
            "#,
        )
        .bind(proof.genesis_asset_id)
        .bind(proof.script_key_id)
        .bind(proof.amount)
        .fetch_one(&mut *self.tx)
        .await?;

        let (proof_id,): (i64,) = sqlx::query_as(
            "INSERT INTO asset_proofs (asset_id, proof_file) VALUES (?, ?) RETURNING proof_id",
        )
        .bind(asset_id)
        .bind(&proof.proof_file)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(AssetProof {
            proof_id,
            asset_id,
            proof_file: proof.proof_file.clone(),
        })
    }
}

/// Storage of macaroon root keys.
#[async_trait::async_trait]
pub trait KeyStore: Send {
    async fn get_root_key(&mut self, id: &[u8]) -> Result<Option<Vec<u8>>>;

    async fn insert_root_key(&mut self, id: &[u8], root_key: &[u8]) -> Result<()>;
}

#[async_trait::async_trait]
impl KeyStore for SqliteTx {
    async fn get_root_key(&mut self, id: &[u8]) -> Result<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT root_key FROM macaroons WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(|(root_key,)| root_key))
    }

    async fn insert_root_key(&mut self, id: &[u8], root_key: &[u8]) -> Result<()> {
        sqlx::query("INSERT INTO macaroons (id, root_key) VALUES (?, ?)")
            .bind(id)
            .bind(root_key)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}
