//! Root keys of macaroons.

use crate::error::{Error, Result, ResultExt};
use crate::executor::{TransactionExecutor, TxBackend, TxOptions};
use crate::queries::KeyStore;
use bitcoin::secp256k1::rand::{RngCore, thread_rng};

/// Length of a generated root key.
pub const ROOT_KEY_LEN: usize = 32;

/// Stores the root keys macaroons are derived from.
pub struct RootKeyStore<B> {
    db: TransactionExecutor<B>,
}

impl<B> RootKeyStore<B>
where
    B: TxBackend + 'static,
    B::Handle: KeyStore,
{
    pub fn new(db: TransactionExecutor<B>) -> Self {
        Self { db }
    }

    /// Returns the root key with the given ID.
    pub async fn get(&self, id: &[u8]) -> Result<Vec<u8>> {
        let id = id.to_vec();

        self.db
            .exec_tx(TxOptions::read(), move |db| {
                Box::pin(async move {
                    db.get_root_key(&id)
                        .await
                        .context("unable to fetch root key")?
                        .ok_or(Error::RootKeyNotFound)
                })
            })
            .await
    }

    /// Returns the root key with the given ID, generating and storing a new
    /// one if none exists yet.
    ///
    /// Returns the root key and its ID.
    pub async fn root_key(&self, id: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        let id = id.to_vec();

        self.db
            .exec_tx(TxOptions::write(), move |db| {
                Box::pin(async move {
                    if let Some(root_key) = db
                        .get_root_key(&id)
                        .await
                        .context("unable to fetch root key")?
                    {
                        return Ok((root_key, id));
                    }

                    let root_key = new_root_key().to_vec();
                    db.insert_root_key(&id, &root_key)
                        .await
                        .context("unable to insert root key")?;

                    tracing::debug!(id = %hex::encode(&id), "Generated macaroon root key");

                    Ok((root_key, id))
                })
            })
            .await
    }
}

fn new_root_key() -> [u8; ROOT_KEY_LEN] {
    let mut root_key = [0u8; ROOT_KEY_LEN];
    thread_rng().fill_bytes(&mut root_key);
    root_key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::sqlite::SqliteStore;
    use bitcoin::Network;

    #[tokio::test]
    async fn root_key_is_generated_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&DatabaseConfig::new(dir.path(), Network::Regtest))
            .await
            .unwrap();
        let keys = RootKeyStore::new(TransactionExecutor::new(store));

        let id = b"0".to_vec();
        assert!(matches!(keys.get(&id).await, Err(Error::RootKeyNotFound)));

        let (root_key, returned_id) = keys.root_key(&id).await.unwrap();
        assert_eq!(returned_id, id);
        assert_eq!(root_key.len(), ROOT_KEY_LEN);

        let (again, _) = keys.root_key(&id).await.unwrap();
        assert_eq!(again, root_key);
        assert_eq!(keys.get(&id).await.unwrap(), root_key);

        let (other, _) = keys.root_key(b"1").await.unwrap();
        assert_ne!(other, root_key);
    }
}
