//! SQLite backend of the address book.

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::executor::{TxBackend, TxOptions};
use bitcoin::Network;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Sqlite, Transaction};

/// SQLite database holding the address book.
///
/// Read-only transactions are served by a pool of read-only connections,
/// writes go through a single writer connection.
#[derive(Clone)]
pub struct SqliteStore {
    reader: SqlitePool,
    writer: SqlitePool,
    network: Network,
}

impl SqliteStore {
    /// Opens or creates the database described by `config`.
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        if config.create_if_missing {
            if let Some(parent) = config.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let writer_options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(config.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .pragma("cache_size", "-16000"); // 16MB cache

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(writer_options)
            .await?;

        // The schema must exist before read-only connections are opened.
        Self::init_schema(&writer).await?;

        let reader_options = SqliteConnectOptions::new()
            .filename(&config.path)
            .read_only(true)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        let reader = SqlitePoolOptions::new()
            .max_connections(config.max_readers.max(1))
            .connect_with(reader_options)
            .await?;

        tracing::info!(
            path = %config.path.display(),
            network = %config.network,
            "Opened address book database"
        );

        Ok(Self {
            reader,
            writer,
            network: config.network,
        })
    }

    /// Initialize database schema.
    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS internal_keys (
                key_id INTEGER PRIMARY KEY,
                raw_key BLOB NOT NULL UNIQUE CHECK(length(raw_key) = 33),
                key_family INTEGER NOT NULL,
                key_index INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS script_keys (
                script_key_id INTEGER PRIMARY KEY,
                internal_key_id INTEGER NOT NULL REFERENCES internal_keys(key_id),
                tweaked_script_key BLOB NOT NULL UNIQUE CHECK(length(tweaked_script_key) = 33),
                tweak BLOB
            );

            CREATE TABLE IF NOT EXISTS genesis_points (
                genesis_id INTEGER PRIMARY KEY,
                prev_out BLOB NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS genesis_assets (
                gen_asset_id INTEGER PRIMARY KEY,
                asset_id BLOB NOT NULL UNIQUE,
                asset_tag TEXT NOT NULL,
                meta_data BLOB,
                output_index INTEGER NOT NULL,
                asset_type INTEGER NOT NULL,
                genesis_point_id INTEGER NOT NULL REFERENCES genesis_points(genesis_id)
            );

            -- Receive addresses
            CREATE TABLE IF NOT EXISTS addrs (
                id INTEGER PRIMARY KEY,
                version INTEGER NOT NULL,
                genesis_asset_id INTEGER NOT NULL REFERENCES genesis_assets(gen_asset_id),
                fam_key BLOB CHECK(length(fam_key) = 33),
                script_key_id INTEGER NOT NULL REFERENCES script_keys(script_key_id),
                taproot_key_id INTEGER NOT NULL REFERENCES internal_keys(key_id),
                taproot_output_key BLOB NOT NULL UNIQUE CHECK(length(taproot_output_key) = 32),
                amount INTEGER NOT NULL,
                asset_type INTEGER NOT NULL,
                creation_time INTEGER NOT NULL,
                managed_from INTEGER
            );
            CREATE INDEX IF NOT EXISTS addr_asset_genesis_ids ON addrs(genesis_asset_id);
            CREATE INDEX IF NOT EXISTS addr_fam_keys ON addrs(fam_key);
            CREATE INDEX IF NOT EXISTS addr_creation_time ON addrs(creation_time);
            CREATE INDEX IF NOT EXISTS addr_managed_from ON addrs(managed_from);

            CREATE TABLE IF NOT EXISTS chain_txns (
                txn_id INTEGER PRIMARY KEY,
                txid BLOB NOT NULL UNIQUE,
                raw_tx BLOB NOT NULL,
                block_height INTEGER,
                block_hash BLOB,
                tx_index INTEGER
            );

            CREATE TABLE IF NOT EXISTS managed_utxos (
                utxo_id INTEGER PRIMARY KEY,
                outpoint BLOB NOT NULL UNIQUE,
                amt_sats INTEGER NOT NULL,
                internal_key_id INTEGER NOT NULL REFERENCES internal_keys(key_id),
                tapscript_sibling BLOB,
                taro_root BLOB NOT NULL CHECK(length(taro_root) = 32),
                txn_id INTEGER NOT NULL REFERENCES chain_txns(txn_id)
            );

            -- Imported assets and their proofs
            CREATE TABLE IF NOT EXISTS assets (
                asset_id INTEGER PRIMARY KEY,
                genesis_id INTEGER NOT NULL REFERENCES genesis_assets(gen_asset_id),
                script_key_id INTEGER NOT NULL REFERENCES script_keys(script_key_id),
                amount INTEGER NOT NULL,
                anchor_utxo_id INTEGER REFERENCES managed_utxos(utxo_id)
            );

            CREATE TABLE IF NOT EXISTS asset_proofs (
                proof_id INTEGER PRIMARY KEY,
                asset_id INTEGER NOT NULL UNIQUE REFERENCES assets(asset_id),
                proof_file BLOB NOT NULL
            );

            -- Funding events of addresses
            CREATE TABLE IF NOT EXISTS addr_events (
                id INTEGER PRIMARY KEY,
                creation_time INTEGER NOT NULL,
                addr_id INTEGER NOT NULL REFERENCES addrs(id),
                status INTEGER NOT NULL CHECK(status IN (0, 1, 2)),
                chain_txn_id INTEGER NOT NULL REFERENCES chain_txns(txn_id),
                chain_txn_output_index INTEGER NOT NULL,
                managed_utxo_id INTEGER NOT NULL REFERENCES managed_utxos(utxo_id),
                asset_proof_id INTEGER REFERENCES asset_proofs(proof_id),
                asset_id INTEGER REFERENCES assets(asset_id),
                UNIQUE(addr_id, chain_txn_id, chain_txn_output_index)
            );
            CREATE INDEX IF NOT EXISTS addr_event_status ON addr_events(status);

            -- Macaroon root keys
            CREATE TABLE IF NOT EXISTS macaroons (
                id BLOB PRIMARY KEY,
                root_key BLOB NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Get the Bitcoin network.
    pub fn network(&self) -> Network {
        self.network
    }

    /// Closes both connection pools.
    pub async fn close(&self) {
        self.reader.close().await;
        self.writer.close().await;
    }
}

/// An open SQLite transaction, the handle passed to transaction bodies.
pub struct SqliteTx {
    pub(crate) tx: Transaction<'static, Sqlite>,
}

#[async_trait::async_trait]
impl TxBackend for SqliteStore {
    type Handle = SqliteTx;

    async fn begin(&self, opts: TxOptions) -> Result<SqliteTx> {
        let pool = if opts.read_only {
            &self.reader
        } else {
            &self.writer
        };
        Ok(SqliteTx {
            tx: pool.begin().await?,
        })
    }

    async fn commit(&self, handle: SqliteTx) -> Result<()> {
        handle.tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self, handle: SqliteTx) -> Result<()> {
        handle.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::TransactionExecutor;

    async fn open_store(dir: &tempfile::TempDir) -> SqliteStore {
        let config = DatabaseConfig::new(dir.path(), Network::Regtest);
        SqliteStore::open(&config).await.unwrap()
    }

    async fn count_macaroons(executor: &TransactionExecutor<SqliteStore>) -> i64 {
        executor
            .exec_tx(TxOptions::read(), |db| {
                Box::pin(async move {
                    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM macaroons")
                        .fetch_one(&mut *db.tx)
                        .await?;
                    Ok(count)
                })
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn failed_transaction_leaves_no_partial_writes() {
        let dir = tempfile::tempdir().unwrap();
        let executor = TransactionExecutor::new(open_store(&dir).await);

        let err = executor
            .exec_tx(TxOptions::write(), |db| {
                Box::pin(async move {
                    sqlx::query("INSERT INTO macaroons (id, root_key) VALUES (?, ?)")
                        .bind(vec![1u8])
                        .bind(vec![2u8; 32])
                        .execute(&mut *db.tx)
                        .await?;
                    // Same primary key again.
                    sqlx::query("INSERT INTO macaroons (id, root_key) VALUES (?, ?)")
                        .bind(vec![1u8])
                        .bind(vec![3u8; 32])
                        .execute(&mut *db.tx)
                        .await?;
                    Ok(())
                })
            })
            .await
            .unwrap_err();

        assert!(err.is_constraint_violation());
        assert_eq!(count_macaroons(&executor).await, 0);
    }

    #[tokio::test]
    async fn reopening_keeps_existing_data() {
        let dir = tempfile::tempdir().unwrap();
        let executor = TransactionExecutor::new(open_store(&dir).await);

        executor
            .exec_tx(TxOptions::write(), |db| {
                Box::pin(async move {
                    sqlx::query("INSERT INTO macaroons (id, root_key) VALUES (?, ?)")
                        .bind(vec![0u8])
                        .bind(vec![7u8; 32])
                        .execute(&mut *db.tx)
                        .await?;
                    Ok(())
                })
            })
            .await
            .unwrap();
        executor.backend().close().await;

        let executor = TransactionExecutor::new(open_store(&dir).await);
        assert_eq!(count_macaroons(&executor).await, 1);
    }

    #[tokio::test]
    async fn read_only_transactions_reject_writes() {
        let dir = tempfile::tempdir().unwrap();
        let executor = TransactionExecutor::new(open_store(&dir).await);

        let result = executor
            .exec_tx(TxOptions::read(), |db| {
                Box::pin(async move {
                    sqlx::query("INSERT INTO macaroons (id, root_key) VALUES (?, ?)")
                        .bind(vec![0u8])
                        .bind(vec![7u8; 32])
                        .execute(&mut *db.tx)
                        .await?;
                    Ok(())
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(count_macaroons(&executor).await, 0);
    }
}
