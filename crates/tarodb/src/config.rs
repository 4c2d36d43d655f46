use bitcoin::Network;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of connections in the read-only pool.
pub const DEFAULT_MAX_READERS: u32 = 4;

/// Default time a connection waits on a locked database.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Address book database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file.
    pub path: PathBuf,
    pub network: Network,
    /// Maximum number of concurrent read-only connections.
    pub max_readers: u32,
    pub busy_timeout: Duration,
    /// Whether to create the database file if it does not exist.
    pub create_if_missing: bool,
}

impl DatabaseConfig {
    /// Creates a config storing the database under `base_path`.
    ///
    /// The database file is stored in a network-specific subdirectory to prevent
    /// mixing addresses of different networks.
    pub fn new(base_path: impl AsRef<Path>, network: Network) -> Self {
        let path = base_path
            .as_ref()
            .join("tarodb")
            .join(network_dir(network))
            .join("tarodb.sqlite");

        Self {
            path,
            network,
            max_readers: DEFAULT_MAX_READERS,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            create_if_missing: true,
        }
    }
}

fn network_dir(network: Network) -> &'static str {
    match network {
        Network::Bitcoin => "mainnet",
        Network::Testnet => "testnet",
        Network::Signet => "signet",
        Network::Regtest => "regtest",
        _ => "unknown",
    }
}
