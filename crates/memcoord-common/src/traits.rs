//! Collaborator traits for store-backed components
//!
//! These traits abstract away the concrete key-value client and the way
//! endpoints are discovered, so cache and lock components depend only on the
//! capability surface they consume.

use std::sync::Arc;

use bytes::Bytes;

use crate::config::{Endpoint, StoreConfig, StoreOptions};
use crate::error::{ClientError, Result};

/// Minimal capability surface of a memcached-style key-value client.
///
/// Implementations must be safe for concurrent use: one client instance is
/// shared by every caller of the component that opened it. TTLs are whole
/// seconds, with `0` meaning "no expiry".
#[async_trait::async_trait]
pub trait KeyValueStoreClient: Send + Sync {
    /// Fetch a payload, `None` if the key is absent or expired
    async fn get(&self, key: &str) -> std::result::Result<Option<Bytes>, ClientError>;

    /// Atomically create `key` only if it does not exist.
    ///
    /// Returns `Ok(false)` when the key already exists. Clients that surface
    /// that condition as an error must use [`ClientError::NotStored`].
    async fn insert_if_absent(
        &self,
        key: &str,
        ttl_secs: u32,
        payload: Bytes,
    ) -> std::result::Result<bool, ClientError>;

    /// Unconditionally write `key`
    async fn set(
        &self,
        key: &str,
        ttl_secs: u32,
        payload: Bytes,
    ) -> std::result::Result<bool, ClientError>;

    /// Delete `key`, returning whether it existed
    async fn delete(&self, key: &str) -> std::result::Result<bool, ClientError>;

    /// Release connections held by this client
    async fn shutdown(&self) -> std::result::Result<(), ClientError>;
}

/// Builds a client bound to a set of endpoints
#[async_trait::async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(
        &self,
        endpoints: &[Endpoint],
        options: &StoreOptions,
    ) -> std::result::Result<Arc<dyn KeyValueStoreClient>, ClientError>;
}

/// Resolves the endpoints a component should connect to
#[async_trait::async_trait]
pub trait ConnectionResolver: Send + Sync {
    async fn resolve_all(&self, correlation_id: Option<&str>) -> Result<Vec<Endpoint>>;
}

/// Resolver returning the endpoints listed in a [`StoreConfig`]
#[derive(Debug, Clone, Default)]
pub struct StaticConnectionResolver {
    endpoints: Vec<Endpoint>,
}

impl StaticConnectionResolver {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self { endpoints }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.endpoints())
    }
}

#[async_trait::async_trait]
impl ConnectionResolver for StaticConnectionResolver {
    async fn resolve_all(&self, _correlation_id: Option<&str>) -> Result<Vec<Endpoint>> {
        Ok(self.endpoints.clone())
    }
}

/// Components with an explicit `closed -> open -> closed` lifecycle
#[async_trait::async_trait]
pub trait Openable: Send + Sync {
    /// Check if the component has been opened
    fn is_open(&self) -> bool;

    /// Open the component, binding it to its store
    async fn open(&self, correlation_id: Option<&str>) -> Result<()>;

    /// Close the component and free used resources.
    ///
    /// Teardown failures are logged, never returned.
    async fn close(&self, correlation_id: Option<&str>);
}
