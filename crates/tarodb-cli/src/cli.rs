use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taro_address::Status;

/// Bitcoin network of the address book.
#[derive(Clone, Copy, Default, Debug, clap::ValueEnum)]
pub enum BitcoinNetwork {
    /// Bitcoin mainnet.
    #[default]
    Mainnet,
    /// Bitcoin testnet.
    Testnet,
    /// Bitcoin signet.
    Signet,
    /// Bitcoin regtest.
    Regtest,
}

impl From<BitcoinNetwork> for bitcoin::Network {
    fn from(network: BitcoinNetwork) -> Self {
        match network {
            BitcoinNetwork::Mainnet => Self::Bitcoin,
            BitcoinNetwork::Testnet => Self::Testnet,
            BitcoinNetwork::Signet => Self::Signet,
            BitcoinNetwork::Regtest => Self::Regtest,
        }
    }
}

/// Status of an address event.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum EventStatus {
    Detected,
    Confirmed,
    Completed,
}

impl From<EventStatus> for Status {
    fn from(status: EventStatus) -> Self {
        match status {
            EventStatus::Detected => Self::TransactionDetected,
            EventStatus::Confirmed => Self::TransactionConfirmed,
            EventStatus::Completed => Self::Completed,
        }
    }
}

/// Taro address book inspector
#[derive(Debug, Parser)]
#[clap(version, about = "Inspect a Taro address book database")]
pub struct App {
    /// Specify the network.
    #[arg(long, value_name = "NETWORK", default_value = "mainnet")]
    pub network: BitcoinNetwork,

    /// Specify the base path of the database.
    ///
    /// The database is located at `<BASE_PATH>/tarodb/<NETWORK>/tarodb.sqlite`.
    #[arg(long, short = 'd', value_name = "PATH", default_value = ".")]
    pub base_path: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List addresses.
    Addrs {
        /// Only list addresses the wallet is not tracking yet.
        #[arg(long)]
        unmanaged_only: bool,

        /// Only list addresses created at or after this unix timestamp.
        #[arg(long, value_name = "TIMESTAMP")]
        created_after: Option<i64>,

        /// Only list addresses created at or before this unix timestamp.
        #[arg(long, value_name = "TIMESTAMP")]
        created_before: Option<i64>,

        /// Maximum number of addresses to list.
        #[arg(long)]
        limit: Option<u32>,

        /// Number of addresses to skip.
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Show the address paying to a taproot output key.
    Addr {
        /// Hex encoded x-only taproot output key.
        taproot_output_key: String,
    },

    /// List address events.
    Events {
        /// Hex encoded x-only taproot output key of the address.
        #[arg(long, value_name = "TAPROOT_OUTPUT_KEY")]
        addr: Option<String>,

        /// Lowest status to list.
        #[arg(long, value_enum)]
        status_from: Option<EventStatus>,

        /// Highest status to list.
        #[arg(long, value_enum)]
        status_to: Option<EventStatus>,
    },
}
