//! Taro addresses and their funding events.
//!
//! This crate holds the types shared between the address manager and the
//! storage backends:
//! - Receive addresses with their key material ([`AddrWithKeyInfo`])
//! - Funding events and their lifecycle ([`Event`], [`Status`])
//! - The storage interfaces ([`Storage`], [`EventStorage`])

mod address;
mod asset;
mod error;
mod event;
mod keys;

pub use address::{AddrWithKeyInfo, AssetLeafCommitter, QueryParams, TapCommitter, Taro};
pub use asset::{AssetId, AssetType, Genesis};
pub use error::AddrError;
pub use event::{Event, EventQueryParams, OutputDetail, Status, WalletTx};
pub use keys::{KeyDescriptor, KeyLocator, PUB_KEY_LEN, PubKey, TweakedScriptKey};

use bitcoin::taproot::TapNodeHash;
use bitcoin::{OutPoint, XOnlyPublicKey};
use chrono::{DateTime, Utc};

/// Persistence of addresses.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Inserts the given addresses atomically.
    async fn insert_addrs(&self, addrs: &[AddrWithKeyInfo]) -> Result<(), Self::Error>;

    /// Returns the addresses matching `params`.
    async fn query_addrs(&self, params: &QueryParams) -> Result<Vec<AddrWithKeyInfo>, Self::Error>;

    /// Returns the address paying to `key`, [`AddrError::NoAddr`] if unknown.
    async fn addr_by_taproot_output(
        &self,
        key: &XOnlyPublicKey,
    ) -> Result<AddrWithKeyInfo, Self::Error>;

    /// Marks an address as tracked by the wallet from `managed_from` on.
    async fn set_addr_managed(
        &self,
        addr: &AddrWithKeyInfo,
        managed_from: DateTime<Utc>,
    ) -> Result<(), Self::Error>;
}

/// Persistence of address funding events.
#[async_trait::async_trait]
pub trait EventStorage: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Records the funding of `addr` by output `output_index` of `wallet_tx`.
    ///
    /// Reporting the same outpoint again updates the existing event in place.
    async fn get_or_create_event(
        &self,
        status: Status,
        addr: &AddrWithKeyInfo,
        wallet_tx: &WalletTx,
        output_index: u32,
        tapscript_sibling: Option<TapNodeHash>,
    ) -> Result<Event, Self::Error>;

    /// Returns the events matching `params`, oldest first.
    async fn query_addr_events(&self, params: &EventQueryParams) -> Result<Vec<Event>, Self::Error>;

    /// Marks an event as completed and links the imported asset and its proof.
    async fn complete_event(
        &self,
        event: &Event,
        status: Status,
        anchor_point: OutPoint,
    ) -> Result<(), Self::Error>;
}
