// Lock backed by the store's atomic insert-if-absent
// Existence of the key is the lock; the TTL is the lease

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use memcoord_common::{
    ClientError, ConnectionResolver, Openable, Result, StoreConfig, StoreConnector, StoreError,
    StoreOptions,
};
use tracing::debug;

use super::{Lock, acquire_lock};
use crate::connection::StoreConnection;
use crate::metrics::{AcquireOutcome, record_lock_acquire, record_lock_release};
use crate::ttl_seconds;

/// Payload written under a held lock key
pub const LOCK_SENTINEL: &str = "lock";

/// Distributed lock over a memcached-style store.
///
/// Ownership is not tracked: any caller may release any key. The store's
/// atomic insert-if-absent guarantees at most one holder per key; no
/// client-side synchronization is added on top of it.
#[derive(Debug)]
pub struct KvLock {
    connection: StoreConnection,
    retry_interval: Duration,
}

impl KvLock {
    /// Create a lock connecting to the endpoints listed in `config`
    pub fn new(config: &StoreConfig, connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            retry_interval: Duration::from_millis(config.options.retry_timeout),
            connection: StoreConnection::new(config, connector),
        }
    }

    /// Create a lock with a custom endpoint resolver
    pub fn with_resolver(
        options: StoreOptions,
        resolver: Arc<dyn ConnectionResolver>,
        connector: Arc<dyn StoreConnector>,
    ) -> Self {
        Self {
            retry_interval: Duration::from_millis(options.retry_timeout),
            connection: StoreConnection::with_resolver(options, resolver, connector),
        }
    }

    /// Acquire a lock, retrying until `timeout_ms` elapses.
    ///
    /// See [`acquire_lock`] for the timing guarantees.
    pub async fn acquire_lock(
        &self,
        correlation_id: Option<&str>,
        key: &str,
        ttl_ms: u64,
        timeout_ms: u64,
    ) -> Result<()> {
        acquire_lock(self, correlation_id, key, ttl_ms, timeout_ms).await
    }
}

#[async_trait::async_trait]
impl Lock for KvLock {
    fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    async fn try_acquire_lock(
        &self,
        correlation_id: Option<&str>,
        key: &str,
        ttl_ms: u64,
    ) -> Result<bool> {
        let client = self.connection.client(correlation_id)?;
        let ttl_secs = ttl_seconds(ttl_ms);

        let outcome = client
            .insert_if_absent(key, ttl_secs, Bytes::from_static(LOCK_SENTINEL.as_bytes()))
            .await;

        let acquired = match outcome {
            Ok(acquired) => acquired,
            Err(ClientError::NotStored) => false,
            Err(e) => {
                record_lock_acquire(AcquireOutcome::Error);
                return Err(StoreError::store_operation(
                    correlation_id,
                    "acquire",
                    key,
                    e,
                ));
            }
        };

        record_lock_acquire(if acquired {
            AcquireOutcome::Acquired
        } else {
            AcquireOutcome::Contended
        });
        debug!(correlation_id, key, ttl_secs, acquired, "Lock attempt");
        Ok(acquired)
    }

    async fn release_lock(&self, correlation_id: Option<&str>, key: &str) -> Result<()> {
        let client = self.connection.client(correlation_id)?;

        let existed = client
            .delete(key)
            .await
            .map_err(|e| StoreError::store_operation(correlation_id, "release", key, e))?;

        record_lock_release();
        debug!(correlation_id, key, existed, "Lock released");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Openable for KvLock {
    fn is_open(&self) -> bool {
        self.connection.is_open()
    }

    async fn open(&self, correlation_id: Option<&str>) -> Result<()> {
        self.connection.open(correlation_id).await
    }

    async fn close(&self, correlation_id: Option<&str>) {
        self.connection.close(correlation_id).await
    }
}
