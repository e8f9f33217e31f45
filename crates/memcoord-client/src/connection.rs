//! Open/closed connection state shared by cache and lock components
//!
//! A [`StoreConnection`] owns the resolver and connector a component was
//! built with, and the client bound while the component is open.

use std::sync::Arc;

use memcoord_common::{
    ConnectionResolver, KeyValueStoreClient, Result, StaticConnectionResolver, StoreConfig,
    StoreConnector, StoreError, StoreOptions,
};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

pub struct StoreConnection {
    options: StoreOptions,
    resolver: Arc<dyn ConnectionResolver>,
    connector: Arc<dyn StoreConnector>,
    client: RwLock<Option<Arc<dyn KeyValueStoreClient>>>,
}

impl StoreConnection {
    /// Connection resolving endpoints from `config`
    pub fn new(config: &StoreConfig, connector: Arc<dyn StoreConnector>) -> Self {
        Self::with_resolver(
            config.options.clone(),
            Arc::new(StaticConnectionResolver::from_config(config)),
            connector,
        )
    }

    pub fn with_resolver(
        options: StoreOptions,
        resolver: Arc<dyn ConnectionResolver>,
        connector: Arc<dyn StoreConnector>,
    ) -> Self {
        Self {
            options,
            resolver,
            connector,
            client: RwLock::new(None),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn is_open(&self) -> bool {
        self.client.read().is_some()
    }

    /// Resolve endpoints and bind a client to all of them.
    ///
    /// On failure nothing is bound and the connection stays closed.
    pub async fn open(&self, correlation_id: Option<&str>) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }

        let endpoints = self.resolver.resolve_all(correlation_id).await?;
        if endpoints.is_empty() {
            return Err(StoreError::no_connection(correlation_id));
        }

        let client = self
            .connector
            .connect(&endpoints, &self.options)
            .await
            .map_err(|e| StoreError::connection(correlation_id, endpoints.len(), e))?;

        let raced = {
            let mut slot = self.client.write();
            if slot.is_some() {
                Some(client)
            } else {
                *slot = Some(client);
                None
            }
        };

        // Another caller opened concurrently; keep its client.
        if let Some(extra) = raced {
            if let Err(e) = extra.shutdown().await {
                warn!(correlation_id, error = %e, "Failed to shut down redundant client");
            }
            return Ok(());
        }

        info!(
            correlation_id,
            endpoints = endpoints.len(),
            "Store connection opened"
        );
        Ok(())
    }

    /// Detach and shut down the bound client. Never fails.
    pub async fn close(&self, correlation_id: Option<&str>) {
        let client = self.client.write().take();
        let Some(client) = client else {
            debug!(correlation_id, "Store connection already closed");
            return;
        };

        if let Err(e) = client.shutdown().await {
            warn!(correlation_id, error = %e, "Store client shutdown failed");
        }
        info!(correlation_id, "Store connection closed");
    }

    /// The bound client, or `InvalidState` when closed
    pub fn client(&self, correlation_id: Option<&str>) -> Result<Arc<dyn KeyValueStoreClient>> {
        self.client
            .read()
            .clone()
            .ok_or_else(|| StoreError::not_opened(correlation_id))
    }
}

impl std::fmt::Debug for StoreConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConnection")
            .field("options", &self.options)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use memcoord_common::{ClientError, Endpoint, error::codes};

    use super::*;
    use crate::memory::{MemoryConnector, MemoryStore};

    /// Client whose shutdown always fails
    struct StubbornClient {
        shutdowns: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl KeyValueStoreClient for StubbornClient {
        async fn get(&self, _key: &str) -> std::result::Result<Option<Bytes>, ClientError> {
            Ok(None)
        }

        async fn insert_if_absent(
            &self,
            _key: &str,
            _ttl_secs: u32,
            _payload: Bytes,
        ) -> std::result::Result<bool, ClientError> {
            Ok(true)
        }

        async fn set(
            &self,
            _key: &str,
            _ttl_secs: u32,
            _payload: Bytes,
        ) -> std::result::Result<bool, ClientError> {
            Ok(true)
        }

        async fn delete(&self, _key: &str) -> std::result::Result<bool, ClientError> {
            Ok(false)
        }

        async fn shutdown(&self) -> std::result::Result<(), ClientError> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "socket already closed",
            )))
        }
    }

    /// Connector that yields before handing out a [`StubbornClient`]
    #[derive(Default)]
    struct StubbornConnector {
        connects: AtomicUsize,
        shutdowns: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl StoreConnector for StubbornConnector {
        async fn connect(
            &self,
            _endpoints: &[Endpoint],
            _options: &StoreOptions,
        ) -> std::result::Result<Arc<dyn KeyValueStoreClient>, ClientError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(Arc::new(StubbornClient {
                shutdowns: self.shutdowns.clone(),
            }))
        }
    }

    struct FailingConnector;

    #[async_trait::async_trait]
    impl StoreConnector for FailingConnector {
        async fn connect(
            &self,
            _endpoints: &[Endpoint],
            _options: &StoreOptions,
        ) -> std::result::Result<Arc<dyn KeyValueStoreClient>, ClientError> {
            Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            )))
        }
    }

    fn memory_connector() -> Arc<dyn StoreConnector> {
        Arc::new(MemoryConnector::new(Arc::new(MemoryStore::new())))
    }

    #[tokio::test]
    async fn test_open_and_close() {
        let config = StoreConfig::from_addrs("localhost").unwrap();
        let connection = StoreConnection::new(&config, memory_connector());
        assert!(!connection.is_open());

        connection.open(Some("c1")).await.unwrap();
        assert!(connection.is_open());
        assert!(connection.client(None).is_ok());

        connection.close(Some("c1")).await;
        assert!(!connection.is_open());
        assert!(matches!(
            connection.client(None),
            Err(StoreError::InvalidState { .. })
        ));

        // Closing twice is harmless
        connection.close(None).await;
    }

    #[tokio::test]
    async fn test_open_without_endpoints() {
        let connection = StoreConnection::new(&StoreConfig::new(), memory_connector());
        let err = connection.open(Some("c1")).await.unwrap_err();

        assert_eq!(err.code(), codes::NO_CONNECTION);
        assert_eq!(err.correlation_id(), Some("c1"));
        assert!(!connection.is_open());
    }

    #[tokio::test]
    async fn test_open_connector_failure_leaves_closed() {
        let config = StoreConfig::from_addrs("a,b").unwrap();
        let connection = StoreConnection::new(&config, Arc::new(FailingConnector));

        let err = connection.open(None).await.unwrap_err();
        assert!(matches!(err, StoreError::Connection { endpoints: 2, .. }));
        assert!(!connection.is_open());
    }

    #[tokio::test]
    async fn test_close_swallows_shutdown_failure() {
        let config = StoreConfig::from_addrs("localhost").unwrap();
        let connector = Arc::new(StubbornConnector::default());
        let connection = StoreConnection::new(&config, connector.clone());

        connection.open(None).await.unwrap();
        connection.close(Some("c1")).await;

        assert_eq!(connector.shutdowns.load(Ordering::SeqCst), 1);
        assert!(!connection.is_open());
        assert!(matches!(
            connection.client(Some("c1")),
            Err(StoreError::InvalidState { .. })
        ));

        connection.close(None).await;
        assert_eq!(connector.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_racing_open_discards_spare_client() {
        let config = StoreConfig::from_addrs("localhost").unwrap();
        let connector = Arc::new(StubbornConnector::default());
        let connection = StoreConnection::new(&config, connector.clone());

        let (a, b) = tokio::join!(connection.open(Some("a")), connection.open(Some("b")));
        a.unwrap();
        b.unwrap();

        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert_eq!(connector.shutdowns.load(Ordering::SeqCst), 1);
        assert!(connection.is_open());

        connection.close(None).await;
        assert_eq!(connector.shutdowns.load(Ordering::SeqCst), 2);
        assert!(!connection.is_open());
    }

    #[tokio::test]
    async fn test_reopen_is_noop() {
        let config = StoreConfig::from_addrs("localhost").unwrap();
        let connection = StoreConnection::new(&config, memory_connector());
        connection.open(None).await.unwrap();
        let first = connection.client(None).unwrap();

        connection.open(None).await.unwrap();
        let second = connection.client(None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
