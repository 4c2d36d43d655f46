//! SQLite-backed address book for Taro.
//!
//! This crate persists receive addresses and tracks the on-chain transactions
//! funding them:
//! - Address insertion and lookup by taproot output key
//! - Address queries by creation time, with pagination and unmanaged-only filtering
//! - Funding event lifecycle from detection through confirmation to completion
//! - Macaroon root keys
//!
//! Every operation runs inside a single transaction of the [`TransactionExecutor`].

mod addrs;
mod config;
mod error;
mod executor;
mod filters;
mod keys;
mod macaroons;
mod queries;
mod sqlite;
mod types;

pub use addrs::TaroAddressBook;
pub use config::{DEFAULT_BUSY_TIMEOUT, DEFAULT_MAX_READERS, DatabaseConfig};
pub use error::{Error, Result};
pub use executor::{TransactionExecutor, TxBackend, TxOptions};
pub use filters::{AddrQuery, EventQuery};
pub use macaroons::{ROOT_KEY_LEN, RootKeyStore};
pub use queries::{AddrBook, KeyStore};
pub use sqlite::{SqliteStore, SqliteTx};
pub use types::{
    AddrEventId, AddrEventRow, AddrManaged, AddrRow, AssetProof, ChainTx, CompleteAddrEvent,
    GenesisRow, InternalKey, NewAddr, NewAssetProof, NewGenesisAsset, NewScriptKey, RawManagedUtxo,
    UpsertAddrEvent,
};
