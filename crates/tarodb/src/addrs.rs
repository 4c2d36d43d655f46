//! Address store and address event lifecycle.

use crate::config::DatabaseConfig;
use crate::error::{Error, Result, ResultExt};
use crate::executor::{TransactionExecutor, TxBackend, TxOptions};
use crate::filters::{AddrQuery, EventQuery};
use crate::keys::{
    parse_family_key, parse_key_desc, parse_pub_key, parse_x_only_key, upsert_internal_key,
    upsert_script_key,
};
use crate::queries::AddrBook;
use crate::sqlite::SqliteStore;
use crate::types::{
    AddrManaged, AddrRow, ChainTx, CompleteAddrEvent, NewAddr, NewAssetProof, NewGenesisAsset,
    RawManagedUtxo, UpsertAddrEvent,
};
use bitcoin::hashes::Hash;
use bitcoin::taproot::TapNodeHash;
use bitcoin::{Amount, BlockHash, Network, OutPoint, Txid, XOnlyPublicKey};
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::Arc;
use taro_address::{
    AddrError, AddrWithKeyInfo, AssetLeafCommitter, AssetType, Event, EventQueryParams,
    EventStorage, Genesis, QueryParams, Status, Storage, TapCommitter, Taro, TweakedScriptKey,
    WalletTx,
};

/// Address book backed by a transactional store.
///
/// Every operation runs in a single transaction of the backend, a failure in
/// any step leaves the store untouched.
pub struct TaroAddressBook<B> {
    db: TransactionExecutor<B>,
    network: Network,
    committer: Arc<dyn TapCommitter>,
}

impl<B: Clone> Clone for TaroAddressBook<B> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            network: self.network,
            committer: self.committer.clone(),
        }
    }
}

impl TaroAddressBook<SqliteStore> {
    /// Opens the SQLite address book described by `config`.
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let store = SqliteStore::open(config).await?;
        Ok(Self::new(
            TransactionExecutor::new(store),
            config.network,
            Arc::new(AssetLeafCommitter),
        ))
    }
}

impl<B> TaroAddressBook<B>
where
    B: TxBackend + 'static,
    B::Handle: AddrBook,
{
    /// Creates a new instance of [`TaroAddressBook`].
    pub fn new(
        db: TransactionExecutor<B>,
        network: Network,
        committer: Arc<dyn TapCommitter>,
    ) -> Self {
        Self {
            db,
            network,
            committer,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Stores an imported asset locked to the script key of `addr` together
    /// with its proof.
    ///
    /// Once imported, events of the address can be completed.
    pub async fn import_asset_proof(
        &self,
        addr: &AddrWithKeyInfo,
        amount: u64,
        proof_file: Vec<u8>,
    ) -> Result<()> {
        let addr = addr.clone();
        let amount = sql_amount(amount)?;

        self.db
            .exec_tx(TxOptions::write(), move |db| {
                Box::pin(async move {
                    let genesis_asset_id = upsert_genesis(db, &addr.taro.genesis)
                        .await
                        .context("unable to upsert genesis")?;
                    let script_key_id =
                        upsert_script_key(db, &addr.script_key_tweak, &addr.taro.script_key)
                            .await
                            .context("unable to upsert script key")?;

                    let proof = db
                        .insert_asset_proof(&NewAssetProof {
                            genesis_asset_id,
                            script_key_id,
                            amount,
                            proof_file,
                        })
                        .await
                        .context("unable to insert asset proof")?;

                    tracing::debug!(
                        script_key = %addr.taro.script_key,
                        proof_id = proof.proof_id,
                        "Imported asset proof"
                    );

                    Ok(())
                })
            })
            .await
    }
}

#[async_trait::async_trait]
impl<B> Storage for TaroAddressBook<B>
where
    B: TxBackend + 'static,
    B::Handle: AddrBook,
{
    type Error = Error;

    async fn insert_addrs(&self, addrs: &[AddrWithKeyInfo]) -> Result<()> {
        let addrs = addrs.to_vec();

        self.db
            .exec_tx(TxOptions::write(), move |db| {
                Box::pin(async move {
                    for addr in &addrs {
                        insert_addr(db, addr).await?;
                    }
                    Ok(())
                })
            })
            .await
    }

    async fn query_addrs(&self, params: &QueryParams) -> Result<Vec<AddrWithKeyInfo>> {
        let query = AddrQuery::from(params);
        let network = self.network;

        self.db
            .exec_tx(TxOptions::read(), move |db| {
                Box::pin(async move {
                    let rows = db
                        .fetch_addrs(&query)
                        .await
                        .context("unable to query addrs")?;

                    let mut addrs = Vec::with_capacity(rows.len());
                    for row in rows {
                        addrs.push(decode_addr(db, row, network).await?);
                    }
                    Ok(addrs)
                })
            })
            .await
    }

    async fn addr_by_taproot_output(&self, key: &XOnlyPublicKey) -> Result<AddrWithKeyInfo> {
        let key = *key;
        let network = self.network;

        self.db
            .exec_tx(TxOptions::read(), move |db| {
                Box::pin(async move { fetch_addr(db, &key, network).await })
            })
            .await
    }

    async fn set_addr_managed(
        &self,
        addr: &AddrWithKeyInfo,
        managed_from: DateTime<Utc>,
    ) -> Result<()> {
        let taproot_output_key = addr.taproot_output_key;

        self.db
            .exec_tx(TxOptions::write(), move |db| {
                Box::pin(async move {
                    let key_bytes = taproot_output_key.serialize().to_vec();

                    let row = db
                        .fetch_addr_by_taproot_output_key(&key_bytes)
                        .await
                        .context("unable to fetch addr")?
                        .ok_or(AddrError::NoAddr)?;

                    if let Some(previous) = row.managed_from {
                        tracing::warn!(
                            %taproot_output_key,
                            previous,
                            managed_from = managed_from.timestamp(),
                            "Overwriting managed_from of address"
                        );
                    }

                    db.set_addr_managed(&AddrManaged {
                        taproot_output_key: key_bytes,
                        managed_from: managed_from.timestamp(),
                    })
                    .await
                    .context("unable to set addr managed")?;

                    Ok(())
                })
            })
            .await
    }
}

#[async_trait::async_trait]
impl<B> EventStorage for TaroAddressBook<B>
where
    B: TxBackend + 'static,
    B::Handle: AddrBook,
{
    type Error = Error;

    async fn get_or_create_event(
        &self,
        status: Status,
        addr: &AddrWithKeyInfo,
        wallet_tx: &WalletTx,
        output_index: u32,
        tapscript_sibling: Option<TapNodeHash>,
    ) -> Result<Event> {
        let output = *wallet_tx.output_detail(output_index)?;
        let amt_sats = sql_amount(output.amount.to_sat())?;

        let txid = wallet_tx.tx.compute_txid();
        let outpoint = OutPoint::new(txid, output_index);

        let raw_tx = bitcoin::consensus::encode::serialize(&wallet_tx.tx);
        let confirmed = wallet_tx.is_confirmed();
        let block_hash = wallet_tx.block_hash.clone();
        let block_height = i64::from(wallet_tx.block_height);

        let addr = addr.clone();
        let committer = self.committer.clone();

        self.db
            .exec_tx(TxOptions::write(), move |db| {
                Box::pin(async move {
                    let taproot_output_key = addr.taproot_output_key.serialize().to_vec();
                    db.fetch_addr_by_taproot_output_key(&taproot_output_key)
                        .await
                        .context("unable to fetch addr")?
                        .ok_or(AddrError::NoAddr)?;

                    let mut chain_tx = ChainTx {
                        txid: txid.to_byte_array().to_vec(),
                        raw_tx,
                        block_height: None,
                        block_hash: None,
                        tx_index: None,
                    };
                    // The index within the block is not known yet.
                    if confirmed {
                        chain_tx.block_height = Some(block_height);
                        chain_tx.block_hash = Some(parse_block_hash(block_hash.as_deref())?);
                    }

                    let txn_id = db
                        .upsert_chain_tx(&chain_tx)
                        .await
                        .context("unable to upsert chain tx")?;

                    let taro_root = committer
                        .tapscript_root(&addr, tapscript_sibling.as_ref())
                        .context("unable to derive commitment")?;

                    let managed_utxo_id = db
                        .upsert_managed_utxo(&RawManagedUtxo {
                            raw_key: addr.taro.internal_key.serialize().to_vec(),
                            outpoint: bitcoin::consensus::encode::serialize(&outpoint),
                            amt_sats,
                            tapscript_sibling: tapscript_sibling
                                .map(|sibling| sibling.to_byte_array().to_vec()),
                            taro_root: taro_root.to_byte_array().to_vec(),
                            txn_id,
                        })
                        .await
                        .context("unable to upsert managed utxo")?;

                    let event_id = db
                        .upsert_addr_event(&UpsertAddrEvent {
                            taproot_output_key,
                            creation_time: Utc::now().timestamp(),
                            status: i64::from(status.code()),
                            txid: outpoint.txid.to_byte_array().to_vec(),
                            chain_txn_output_index: i64::from(outpoint.vout),
                            managed_utxo_id,
                        })
                        .await
                        .context("unable to upsert addr event")?;

                    tracing::debug!(
                        taproot_output_key = %addr.taproot_output_key,
                        %outpoint,
                        %status,
                        event_id,
                        "Upserted address event"
                    );

                    fetch_event(db, event_id, addr).await
                })
            })
            .await
    }

    async fn query_addr_events(&self, params: &EventQueryParams) -> Result<Vec<Event>> {
        let query = EventQuery::from(params);
        let network = self.network;

        self.db
            .exec_tx(TxOptions::read(), move |db| {
                Box::pin(async move {
                    let ids = db
                        .query_event_ids(&query)
                        .await
                        .context("unable to fetch event ids")?;

                    let mut events = Vec::with_capacity(ids.len());
                    for id in ids {
                        let key = parse_x_only_key("taproot output key", &id.taproot_output_key)?;
                        let addr = fetch_addr(db, &key, network)
                            .await
                            .context("unable to fetch addr")?;
                        events.push(fetch_event(db, id.event_id, addr).await?);
                    }
                    Ok(events)
                })
            })
            .await
    }

    async fn complete_event(
        &self,
        event: &Event,
        status: Status,
        anchor_point: OutPoint,
    ) -> Result<()> {
        let script_key = event.addr.taro.script_key.serialize().to_vec();
        let taproot_output_key = event.addr.taproot_output_key;

        self.db
            .exec_tx(TxOptions::write(), move |db| {
                Box::pin(async move {
                    let proof = db
                        .fetch_asset_proof(&script_key)
                        .await
                        .context("unable to fetch asset proof")?
                        .ok_or(Error::MissingDependency { what: "asset proof" })?;

                    let event_id = db
                        .complete_addr_event(&CompleteAddrEvent {
                            taproot_output_key: taproot_output_key.serialize().to_vec(),
                            status: i64::from(status.code()),
                            txid: anchor_point.txid.to_byte_array().to_vec(),
                            chain_txn_output_index: i64::from(anchor_point.vout),
                            asset_proof_id: proof.proof_id,
                            asset_id: proof.asset_id,
                        })
                        .await
                        .context("unable to complete addr event")?
                        .ok_or(Error::MissingDependency { what: "addr event" })?;

                    tracing::debug!(
                        %taproot_output_key,
                        %anchor_point,
                        %status,
                        proof_id = proof.proof_id,
                        event_id,
                        "Completed address event"
                    );

                    Ok(())
                })
            })
            .await
    }
}

async fn upsert_genesis<D: AddrBook>(db: &mut D, genesis: &Genesis) -> Result<i64> {
    let genesis_point_id = db
        .upsert_genesis_point(&bitcoin::consensus::encode::serialize(
            &genesis.first_prev_out,
        ))
        .await?;

    db.upsert_genesis_asset(&NewGenesisAsset {
        asset_id: genesis.asset_id().as_bytes().to_vec(),
        asset_tag: genesis.tag.clone(),
        meta_data: genesis.metadata.clone(),
        output_index: i64::from(genesis.output_index),
        asset_type: i64::from(genesis.asset_type.code()),
        genesis_point_id,
    })
    .await
}

async fn insert_addr<D: AddrBook>(db: &mut D, addr: &AddrWithKeyInfo) -> Result<()> {
    let genesis_asset_id = upsert_genesis(db, &addr.taro.genesis)
        .await
        .context("unable to upsert genesis")?;

    let script_key_id = upsert_script_key(db, &addr.script_key_tweak, &addr.taro.script_key)
        .await
        .context("unable to upsert script key")?;

    let taproot_key_id = upsert_internal_key(db, &addr.internal_key_desc)
        .await
        .context("unable to upsert internal key")?;

    let id = db
        .insert_addr(&NewAddr {
            version: i64::from(addr.taro.version),
            genesis_asset_id,
            fam_key: addr
                .taro
                .family_key
                .map(|family_key| family_key.serialize().to_vec()),
            script_key_id,
            taproot_key_id,
            taproot_output_key: addr.taproot_output_key.serialize().to_vec(),
            amount: sql_amount(addr.taro.amount)?,
            asset_type: i64::from(addr.taro.asset_type().code()),
            creation_time: addr.creation_time.timestamp(),
        })
        .await
        .context("unable to insert addr")?;

    tracing::debug!(
        taproot_output_key = %addr.taproot_output_key,
        asset_id = %addr.taro.asset_id(),
        id,
        "Inserted address"
    );

    Ok(())
}

async fn fetch_addr<D: AddrBook>(
    db: &mut D,
    key: &XOnlyPublicKey,
    network: Network,
) -> Result<AddrWithKeyInfo> {
    let row = db
        .fetch_addr_by_taproot_output_key(&key.serialize())
        .await
        .context("unable to fetch addr")?
        .ok_or(AddrError::NoAddr)?;

    decode_addr(db, row, network).await
}

/// Rebuilds an address from its row and its genesis.
async fn decode_addr<D: AddrBook>(
    db: &mut D,
    row: AddrRow,
    network: Network,
) -> Result<AddrWithKeyInfo> {
    let genesis = db
        .fetch_genesis_by_id(row.genesis_asset_id)
        .await
        .context("unable to fetch genesis")?
        .ok_or(Error::MissingDependency {
            what: "genesis asset",
        })?;

    let genesis = Genesis {
        first_prev_out: bitcoin::consensus::encode::deserialize(&genesis.prev_out)
            .map_err(|err| Error::decode("genesis outpoint", err))?,
        tag: genesis.asset_tag,
        metadata: genesis.meta_data.unwrap_or_default(),
        output_index: u32::try_from(genesis.output_index)
            .map_err(|err| Error::decode("genesis output index", err))?,
        asset_type: AssetType::try_from(genesis.asset_type)
            .map_err(|err| Error::decode("asset type", err))?,
    };

    let script_key = parse_pub_key("script key", &row.tweaked_script_key)?;
    let raw_script_key = parse_key_desc(
        "raw script key",
        &row.script_key_raw,
        row.script_key_family,
        row.script_key_index,
    )?;
    let internal_key_desc = parse_key_desc(
        "taproot internal key",
        &row.raw_taproot_key,
        row.taproot_key_family,
        row.taproot_key_index,
    )?;

    Ok(AddrWithKeyInfo {
        taro: Taro {
            version: u8::try_from(row.version)
                .map_err(|err| Error::decode("address version", err))?,
            genesis,
            family_key: parse_family_key(row.fam_key.as_deref())?,
            script_key,
            internal_key: internal_key_desc.pub_key,
            amount: u64::try_from(row.amount).map_err(|err| Error::decode("amount", err))?,
            network,
        },
        script_key_tweak: TweakedScriptKey {
            raw_key: raw_script_key,
            tweak: row.script_key_tweak.unwrap_or_default(),
        },
        internal_key_desc,
        taproot_output_key: parse_x_only_key("taproot output key", &row.taproot_output_key)?,
        creation_time: parse_timestamp("creation time", row.creation_time)?,
        managed_from: row
            .managed_from
            .map(|secs| parse_timestamp("managed_from", secs))
            .transpose()?,
    })
}

async fn fetch_event<D: AddrBook>(db: &mut D, id: i64, addr: AddrWithKeyInfo) -> Result<Event> {
    let row = db
        .fetch_addr_event(id)
        .await
        .context("unable to fetch addr event")?
        .ok_or(Error::MissingDependency { what: "addr event" })?;

    let txid = Txid::from_slice(&row.txid).map_err(|err| Error::decode("txid", err))?;

    Ok(Event {
        id: row.id,
        creation_time: parse_timestamp("event creation time", row.creation_time)?,
        addr,
        status: Status::try_from(row.status).map_err(|err| Error::decode("event status", err))?,
        outpoint: OutPoint::new(
            txid,
            u32::try_from(row.output_index).map_err(|err| Error::decode("output index", err))?,
        ),
        amount: Amount::from_sat(
            u64::try_from(row.amt_sats).map_err(|err| Error::decode("output amount", err))?,
        ),
        internal_key: parse_pub_key("internal key", &row.internal_key)?,
        tapscript_sibling: row
            .tapscript_sibling
            .map(|bytes| {
                TapNodeHash::from_slice(&bytes)
                    .map_err(|err| Error::decode("tapscript sibling", err))
            })
            .transpose()?,
        confirmation_height: row
            .confirmation_height
            .map(|height| {
                u32::try_from(height).map_err(|err| Error::decode("confirmation height", err))
            })
            .transpose()?,
        has_proof: row.asset_proof_id.is_some(),
    })
}

fn parse_block_hash(block_hash: Option<&str>) -> Result<Vec<u8>> {
    let block_hash = block_hash.ok_or_else(|| Error::decode("block hash", "missing block hash"))?;
    let block_hash =
        BlockHash::from_str(block_hash).map_err(|err| Error::decode("block hash", err))?;
    Ok(block_hash.to_byte_array().to_vec())
}

fn sql_amount(amount: u64) -> Result<i64> {
    i64::try_from(amount).map_err(|_| AddrError::AmountOutOfRange(amount).into())
}

fn parse_timestamp(what: &'static str, secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| Error::decode(what, format!("invalid timestamp {secs}")))
}
