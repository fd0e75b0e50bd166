// Bounded connection pool with acquire timeout

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::error::StoreError;
use crate::schema::{Storage, StorageConfig};

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: usize = 20;

/// Default wait for a free connection before failing with `Unavailable`.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);

/// Bounded pool of SQLite connections over one WAL database.
///
/// Callers queue on a semaphore when the pool is exhausted; waiting longer
/// than the acquire timeout fails the query with [`StoreError::Unavailable`]
/// so the caller can degrade instead of hanging. Transient busy/locked
/// errors are retried once before surfacing.
#[derive(Clone)]
pub struct StorePool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    connections: Mutex<Vec<Storage>>,
    permits: Semaphore,
    acquire_timeout: Duration,
    config: StorageConfig,
}

impl StorePool {
    /// Open a pool with default size and acquire timeout.
    pub fn open(config: StorageConfig) -> Result<Self, StoreError> {
        Self::open_with(config, DEFAULT_POOL_SIZE, DEFAULT_ACQUIRE_TIMEOUT)
    }

    /// Open a pool of `size` connections.
    pub fn open_with(
        config: StorageConfig,
        size: usize,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let size = size.max(1);
        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            connections.push(Storage::open_with_config(config.clone())?);
        }

        Ok(Self {
            inner: Arc::new(PoolInner {
                connections: Mutex::new(connections),
                permits: Semaphore::new(size),
                acquire_timeout,
                config,
            }),
        })
    }

    /// The storage configuration the pool was opened with.
    pub fn config(&self) -> &StorageConfig {
        &self.inner.config
    }

    /// Run an operation against a pooled connection.
    ///
    /// The closure executes synchronously while the connection is checked
    /// out; it must not block on anything other than SQLite itself.
    pub async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Fn(&rusqlite::Connection) -> Result<T, StoreError> + Send,
        T: Send,
    {
        let permit = tokio::time::timeout(self.inner.acquire_timeout, self.inner.permits.acquire())
            .await
            .map_err(|_| {
                StoreError::Unavailable(format!(
                    "connection pool exhausted after {:?}",
                    self.inner.acquire_timeout
                ))
            })?
            .map_err(|_| StoreError::Unavailable("connection pool closed".to_string()))?;

        let storage = self
            .inner
            .connections
            .lock()
            .map_err(|_| StoreError::Unavailable("connection pool poisoned".to_string()))?
            .pop()
            .ok_or_else(|| StoreError::Unavailable("no pooled connection free".to_string()))?;

        let mut result = op(storage.conn());
        if result.as_ref().err().is_some_and(StoreError::is_transient) {
            warn!("transient store error, retrying once");
            result = op(storage.conn());
        }

        if let Ok(mut connections) = self.inner.connections.lock() {
            connections.push(storage);
        }
        drop(permit);

        result
    }
}
