//! Random fixtures shared by the address book tests.

#![allow(dead_code)]

use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::rand::thread_rng;
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use bitcoin::taproot::TapNodeHash;
use bitcoin::transaction::Version;
use bitcoin::{Amount, BlockHash, Network, OutPoint, ScriptBuf, Transaction, TxIn, TxOut, Txid};
use chrono::{SubsecRound, Utc};
use std::sync::Arc;
use taro_address::{
    AddrWithKeyInfo, AssetLeafCommitter, AssetType, Genesis, KeyDescriptor, KeyLocator,
    OutputDetail, PubKey, Taro, TweakedScriptKey, WalletTx,
};
use tarodb::{DatabaseConfig, SqliteStore, TaroAddressBook, TransactionExecutor};
use tempfile::TempDir;

pub const NETWORK: Network = Network::Regtest;

/// An address book in a temporary directory.
pub struct TestDb {
    pub book: TaroAddressBook<SqliteStore>,
    /// Direct access to the store operations, bypassing the address book.
    pub raw: TransactionExecutor<SqliteStore>,
    _dir: TempDir,
}

pub async fn new_addr_book() -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&DatabaseConfig::new(dir.path(), NETWORK))
        .await
        .unwrap();

    TestDb {
        book: TaroAddressBook::new(
            TransactionExecutor::new(store.clone()),
            NETWORK,
            Arc::new(AssetLeafCommitter),
        ),
        raw: TransactionExecutor::new(store),
        _dir: dir,
    }
}

pub fn rand_array() -> [u8; 32] {
    let mut bytes = [0u8; 32];
    fastrand::fill(&mut bytes);
    bytes
}

pub fn rand_bytes(len: usize) -> Vec<u8> {
    std::iter::repeat_with(|| fastrand::u8(..))
        .take(len)
        .collect()
}

pub fn rand_pub_key() -> PublicKey {
    let secp = Secp256k1::new();
    PublicKey::from_secret_key(&secp, &SecretKey::new(&mut thread_rng()))
}

pub fn rand_outpoint() -> OutPoint {
    OutPoint::new(Txid::from_byte_array(rand_array()), fastrand::u32(..))
}

pub fn rand_hash() -> TapNodeHash {
    TapNodeHash::from_byte_array(rand_array())
}

fn rand_key_desc(pub_key: PublicKey) -> KeyDescriptor {
    KeyDescriptor {
        locator: KeyLocator {
            family: fastrand::u32(..),
            index: fastrand::u32(..),
        },
        pub_key,
    }
}

pub fn rand_addr() -> AddrWithKeyInfo {
    let internal_key = rand_pub_key();
    let asset_type = if fastrand::bool() {
        AssetType::Normal
    } else {
        AssetType::Collectible
    };

    AddrWithKeyInfo {
        taro: Taro {
            version: 0,
            genesis: Genesis {
                first_prev_out: rand_outpoint(),
                tag: format!("asset-{}", fastrand::u32(..)),
                metadata: rand_bytes(fastrand::usize(0..64)),
                output_index: fastrand::u32(..),
                asset_type,
            },
            family_key: fastrand::bool().then(|| PubKey::from(rand_pub_key())),
            script_key: rand_pub_key(),
            internal_key,
            amount: fastrand::u64(1..1_000_000),
            network: NETWORK,
        },
        script_key_tweak: TweakedScriptKey {
            raw_key: rand_key_desc(rand_pub_key()),
            tweak: rand_bytes(32),
        },
        internal_key_desc: rand_key_desc(internal_key),
        taproot_output_key: rand_pub_key().x_only_public_key().0,
        // Stored with second precision.
        creation_time: Utc::now().trunc_subsecs(0),
        managed_from: None,
    }
}

pub fn rand_wallet_tx() -> WalletTx {
    let input = (0..fastrand::usize(1..=10))
        .map(|_| TxIn {
            previous_output: rand_outpoint(),
            ..Default::default()
        })
        .collect();

    let output: Vec<TxOut> = (0..fastrand::usize(1..=5))
        .map(|_| TxOut {
            value: Amount::from_sat(fastrand::u64(..5_000_000)),
            script_pubkey: ScriptBuf::from_bytes(rand_bytes(34)),
        })
        .collect();

    let output_details = output
        .iter()
        .map(|out| OutputDetail {
            amount: out.value,
            is_ours: fastrand::bool(),
        })
        .collect();

    WalletTx {
        tx: Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input,
            output,
        },
        confirmations: 0,
        block_hash: None,
        block_height: 0,
        output_details,
    }
}

pub fn confirm_tx(wallet_tx: &mut WalletTx) {
    wallet_tx.confirmations = fastrand::u32(1..=50);
    wallet_tx.block_hash = Some(BlockHash::from_byte_array(rand_array()).to_string());
    wallet_tx.block_height = fastrand::u32(..700_000);
}

pub fn rand_output_index(wallet_tx: &WalletTx) -> u32 {
    fastrand::usize(..wallet_tx.tx.output.len()) as u32
}
