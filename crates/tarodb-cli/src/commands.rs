use crate::cli::{App, Command};
use bitcoin::XOnlyPublicKey;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;
use taro_address::{AddrWithKeyInfo, Event, EventQueryParams, EventStorage, QueryParams, Storage};
use tarodb::{DatabaseConfig, TaroAddressBook};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Database(#[from] tarodb::Error),

    #[error("Invalid taproot output key: {0}")]
    InvalidKey(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Address as printed by the CLI.
#[derive(Debug, Serialize)]
struct AddrSummary {
    taproot_output_key: String,
    asset_id: String,
    asset_type: u8,
    amount: u64,
    script_key: String,
    internal_key: String,
    family_key: Option<String>,
    creation_time: String,
    managed_from: Option<String>,
}

impl From<&AddrWithKeyInfo> for AddrSummary {
    fn from(addr: &AddrWithKeyInfo) -> Self {
        Self {
            taproot_output_key: addr.taproot_output_key.to_string(),
            asset_id: addr.taro.asset_id().to_string(),
            asset_type: addr.taro.asset_type().code(),
            amount: addr.taro.amount,
            script_key: addr.taro.script_key.to_string(),
            internal_key: addr.taro.internal_key.to_string(),
            family_key: addr
                .taro
                .family_key
                .map(|family_key| hex::encode(family_key.serialize())),
            creation_time: addr.creation_time.to_rfc3339(),
            managed_from: addr.managed_from.map(|time| time.to_rfc3339()),
        }
    }
}

/// Address event as printed by the CLI.
#[derive(Debug, Serialize)]
struct EventSummary {
    id: i64,
    taproot_output_key: String,
    status: String,
    outpoint: String,
    amount_sats: u64,
    confirmation_height: Option<u32>,
    has_proof: bool,
    creation_time: String,
}

impl From<&Event> for EventSummary {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id,
            taproot_output_key: event.addr.taproot_output_key.to_string(),
            status: event.status.to_string(),
            outpoint: event.outpoint.to_string(),
            amount_sats: event.amount.to_sat(),
            confirmation_height: event.confirmation_height,
            has_proof: event.has_proof,
            creation_time: event.creation_time.to_rfc3339(),
        }
    }
}

pub async fn run(app: App) -> Result<(), Error> {
    let mut config = DatabaseConfig::new(&app.base_path, app.network.into());
    config.create_if_missing = false;

    let book = TaroAddressBook::open(&config).await?;

    match app.command {
        Command::Addrs {
            unmanaged_only,
            created_after,
            created_before,
            limit,
            offset,
        } => {
            let params = QueryParams {
                created_after: created_after.map(parse_timestamp).transpose()?,
                created_before: created_before.map(parse_timestamp).transpose()?,
                limit,
                offset,
                unmanaged_only,
            };

            let addrs = book.query_addrs(&params).await?;
            tracing::debug!(count = addrs.len(), "Fetched addresses");

            print_json(&addrs.iter().map(AddrSummary::from).collect::<Vec<_>>())
        }
        Command::Addr { taproot_output_key } => {
            let key = XOnlyPublicKey::from_str(&taproot_output_key)
                .map_err(|_| Error::InvalidKey(taproot_output_key))?;

            let addr = book.addr_by_taproot_output(&key).await?;

            print_json(&AddrSummary::from(&addr))
        }
        Command::Events {
            addr,
            status_from,
            status_to,
        } => {
            let addr_taproot_output_key = addr
                .map(|key| hex::decode(&key).map_err(|_| Error::InvalidKey(key)))
                .transpose()?;

            let params = EventQueryParams {
                addr_taproot_output_key,
                status_from: status_from.map(Into::into),
                status_to: status_to.map(Into::into),
            };

            let events = book.query_addr_events(&params).await?;
            tracing::debug!(count = events.len(), "Fetched address events");

            print_json(&events.iter().map(EventSummary::from).collect::<Vec<_>>())
        }
    }
}

fn parse_timestamp(secs: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp(secs, 0).ok_or(Error::InvalidTimestamp(secs))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
