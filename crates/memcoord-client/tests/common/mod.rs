//! Shared fixtures for memcoord-client integration tests

#![allow(dead_code)]

use std::sync::Arc;

use memcoord_client::{KvCache, KvLock, ManualClock, MemoryConnector, MemoryStore, StoreConfig};
use tracing_subscriber::EnvFilter;

pub const TEST_SERVERS: &str = "127.0.0.1:11211";

/// Install a test subscriber honoring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A store server with a controllable clock
pub struct TestStore {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
}

impl TestStore {
    pub fn new() -> Self {
        init_tracing();
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        Self { clock, store }
    }

    pub fn connector(&self) -> Arc<MemoryConnector> {
        Arc::new(MemoryConnector::new(self.store.clone()))
    }

    pub fn config(&self) -> StoreConfig {
        StoreConfig::from_addrs(TEST_SERVERS).expect("valid test servers")
    }

    pub fn cache(&self) -> KvCache {
        KvCache::new(&self.config(), self.connector())
    }

    pub fn lock(&self) -> KvLock {
        KvLock::new(&self.config().with_retry_timeout(20), self.connector())
    }
}
