//! TTL value cache backed by a shared key-value store
//!
//! Values are encoded with [`crate::codec`] on write; reads return the stored
//! text as-is. Expiry is left entirely to the store.

use std::sync::Arc;

use bytes::Bytes;
use memcoord_common::{
    ConnectionResolver, Openable, Result, StoreConfig, StoreConnector, StoreError, StoreOptions,
};
use tracing::debug;

use crate::codec::{self, CacheEncode};
use crate::connection::StoreConnection;
use crate::metrics::record_cache_request;
use crate::ttl_seconds;

/// Distributed cache over a memcached-style store
#[derive(Debug)]
pub struct KvCache {
    connection: StoreConnection,
}

impl KvCache {
    /// Create a cache connecting to the endpoints listed in `config`
    pub fn new(config: &StoreConfig, connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            connection: StoreConnection::new(config, connector),
        }
    }

    /// Create a cache with a custom endpoint resolver
    pub fn with_resolver(
        options: StoreOptions,
        resolver: Arc<dyn ConnectionResolver>,
        connector: Arc<dyn StoreConnector>,
    ) -> Self {
        Self {
            connection: StoreConnection::with_resolver(options, resolver, connector),
        }
    }

    /// Retrieve a cached value by key.
    ///
    /// Returns `None` if the value is missing or expired.
    pub async fn retrieve(&self, correlation_id: Option<&str>, key: &str) -> Result<Option<String>> {
        let client = self.connection.client(correlation_id)?;

        let payload = client.get(key).await.map_err(|e| {
            record_cache_request("retrieve", "error");
            StoreError::store_operation(correlation_id, "retrieve", key, e)
        })?;

        let Some(payload) = payload else {
            record_cache_request("retrieve", "miss");
            debug!(correlation_id, key, "Cache miss");
            return Ok(None);
        };

        record_cache_request("retrieve", "hit");
        debug!(correlation_id, key, "Cache hit");
        codec::decode_payload(payload)
            .map(Some)
            .map_err(|e| StoreError::serialization(correlation_id, e))
    }

    /// Store a value with an expiration timeout in milliseconds.
    ///
    /// The timeout is truncated to whole seconds. Returns the encoded text
    /// that was written, not the original value.
    pub async fn store<V: CacheEncode + ?Sized>(
        &self,
        correlation_id: Option<&str>,
        key: &str,
        value: &V,
        ttl_ms: u64,
    ) -> Result<String> {
        let client = self.connection.client(correlation_id)?;
        let ttl_secs = ttl_seconds(ttl_ms);

        let encoded =
            codec::encode_value(value).map_err(|e| StoreError::serialization(correlation_id, e))?;

        client
            .set(key, ttl_secs, Bytes::from(encoded.clone()))
            .await
            .map_err(|e| {
                record_cache_request("store", "error");
                StoreError::store_operation(correlation_id, "store", key, e)
            })?;

        record_cache_request("store", "ok");
        debug!(correlation_id, key, ttl_secs, "Cache value stored");
        Ok(encoded)
    }

    /// Remove a value by key. Removing an absent key is not an error.
    pub async fn remove(&self, correlation_id: Option<&str>, key: &str) -> Result<()> {
        let client = self.connection.client(correlation_id)?;

        let existed = client.delete(key).await.map_err(|e| {
            record_cache_request("remove", "error");
            StoreError::store_operation(correlation_id, "remove", key, e)
        })?;

        record_cache_request("remove", "ok");
        debug!(correlation_id, key, existed, "Cache value removed");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Openable for KvCache {
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
