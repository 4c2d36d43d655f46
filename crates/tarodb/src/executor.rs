//! Atomic execution of a unit of work against a storage backend.

use crate::error::Result;
use futures::future::BoxFuture;

/// Options of a database transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    /// Whether the transaction only reads.
    pub read_only: bool,
}

impl TxOptions {
    pub fn read() -> Self {
        Self { read_only: true }
    }

    pub fn write() -> Self {
        Self { read_only: false }
    }
}

/// A storage engine able to run atomic transactions.
///
/// `Handle` exposes the engine's queries bound to one open transaction.
#[async_trait::async_trait]
pub trait TxBackend: Send + Sync {
    type Handle: Send;

    /// Opens a new transaction.
    async fn begin(&self, opts: TxOptions) -> Result<Self::Handle>;

    /// Commits the transaction.
    async fn commit(&self, handle: Self::Handle) -> Result<()>;

    /// Rolls the transaction back.
    async fn rollback(&self, handle: Self::Handle) -> Result<()>;
}

/// Runs closures inside a single transaction of the backend `B`.
#[derive(Debug, Clone)]
pub struct TransactionExecutor<B> {
    backend: B,
}

impl<B: TxBackend> TransactionExecutor<B> {
    /// Creates a new instance of [`TransactionExecutor`].
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Get the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Executes `body` in one transaction.
    ///
    /// The transaction is committed if `body` succeeds and rolled back otherwise.
    /// Dropping the returned future before completion rolls the transaction back
    /// as well, partial writes are never visible.
    pub async fn exec_tx<T, F>(&self, opts: TxOptions, body: F) -> Result<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut B::Handle) -> BoxFuture<'c, Result<T>> + Send,
    {
        let mut handle = self.backend.begin(opts).await?;
        tracing::trace!(read_only = opts.read_only, "Began transaction");

        match body(&mut handle).await {
            Ok(value) => {
                self.backend.commit(handle).await?;
                tracing::trace!(read_only = opts.read_only, "Committed transaction");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.backend.rollback(handle).await {
                    tracing::warn!(?rollback_err, "Failed to roll back transaction");
                }
                tracing::trace!(?err, "Rolled back transaction");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::{Arc, Mutex};

    /// Keeps committed values, a transaction works on a private copy.
    #[derive(Default)]
    struct MemBackend {
        committed: Arc<Mutex<Vec<u32>>>,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait::async_trait]
    impl TxBackend for MemBackend {
        type Handle = (bool, Vec<u32>);

        async fn begin(&self, opts: TxOptions) -> Result<Self::Handle> {
            self.log.lock().unwrap().push("begin");
            Ok((opts.read_only, self.committed.lock().unwrap().clone()))
        }

        async fn commit(&self, handle: Self::Handle) -> Result<()> {
            self.log.lock().unwrap().push("commit");
            if !handle.0 {
                *self.committed.lock().unwrap() = handle.1;
            }
            Ok(())
        }

        async fn rollback(&self, _handle: Self::Handle) -> Result<()> {
            self.log.lock().unwrap().push("rollback");
            Ok(())
        }
    }

    #[tokio::test]
    async fn commits_on_success() {
        let executor = TransactionExecutor::new(MemBackend::default());

        let len = executor
            .exec_tx(TxOptions::write(), |handle| {
                Box::pin(async move {
                    handle.1.push(1);
                    handle.1.push(2);
                    Ok(handle.1.len())
                })
            })
            .await
            .unwrap();

        assert_eq!(len, 2);
        assert_eq!(*executor.backend().committed.lock().unwrap(), vec![1, 2]);
        assert_eq!(*executor.backend().log.lock().unwrap(), vec!["begin", "commit"]);
    }

    #[tokio::test]
    async fn rolls_back_on_error() {
        let executor = TransactionExecutor::new(MemBackend::default());

        let err = executor
            .exec_tx(TxOptions::write(), |handle| {
                Box::pin(async move {
                    handle.1.push(1);
                    Err::<(), _>(Error::MissingDependency {
                        what: "genesis asset",
                    })
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingDependency { .. }));
        assert!(executor.backend().committed.lock().unwrap().is_empty());
        assert_eq!(
            *executor.backend().log.lock().unwrap(),
            vec!["begin", "rollback"]
        );
    }

    #[tokio::test]
    async fn passes_read_only_hint() {
        let executor = TransactionExecutor::new(MemBackend::default());

        let read_only = executor
            .exec_tx(TxOptions::read(), |handle| Box::pin(async move { Ok(handle.0) }))
            .await
            .unwrap();
        assert!(read_only);
    }
}
