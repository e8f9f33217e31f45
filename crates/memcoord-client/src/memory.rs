//! In-memory key-value store with memcached semantics
//!
//! [`MemoryStore`] plays the role of a store server: several components can
//! connect to the same instance through a [`MemoryConnector`] and observe each
//! other's writes. Expiry is evaluated lazily against a pluggable [`Clock`],
//! so tests can drive TTLs with a [`ManualClock`]. Long-lived stores should
//! run [`MemoryStore::spawn_expiry_task`] so entries that are never touched
//! again are still reclaimed.

use std::fmt;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use memcoord_common::{ClientError, Endpoint, KeyValueStoreClient, StoreConnector, StoreOptions};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Time source used to evaluate entry expiry
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset_nanos: AtomicU64,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .offset_nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |offset| {
                Some(offset.saturating_add(nanos))
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

struct MemoryEntry {
    payload: Bytes,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn new(payload: Bytes, ttl_secs: u32, now: Instant) -> Self {
        let expires_at = if ttl_secs == 0 {
            None
        } else {
            Some(now + Duration::from_secs(u64::from(ttl_secs)))
        };
        Self {
            payload,
            expires_at,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Shared in-memory store
pub struct MemoryStore {
    entries: DashMap<String, MemoryEntry>,
    clock: Arc<dyn Clock>,
    options: StoreOptions,
    calls: AtomicU64,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.entries.len())
            .field("clock", &self.clock)
            .field("calls", &self.calls.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            options: StoreOptions::default(),
            calls: AtomicU64::new(0),
        }
    }

    /// Set the key and value size limits enforced by the store
    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Number of requests served so far
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of live (non-expired) entries
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            debug!(count = removed, "Purged expired entries");
        }
        removed
    }

    /// Start a background task purging expired entries every `every`.
    ///
    /// The task holds a weak reference and exits once the store is dropped.
    /// Must be called from within a tokio runtime.
    pub fn spawn_expiry_task(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let every = every.max(Duration::from_millis(1));
        let store = Arc::downgrade(self);
        info!(interval_ms = every.as_millis() as u64, "Starting expiry task");
        tokio::spawn(run_expiry(store, every))
    }

    fn check_request(&self, key: &str, payload: Option<&Bytes>) -> Result<(), ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        check_limits(&self.options, key, payload)
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>, ClientError> {
        self.check_request(key, None)?;
        let now = self.clock.now();

        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            return Ok(None);
        }
        Ok(self.entries.get(key).map(|entry| entry.payload.clone()))
    }

    fn add(&self, key: &str, ttl_secs: u32, payload: Bytes) -> Result<bool, ClientError> {
        self.check_request(key, Some(&payload))?;
        let now = self.clock.now();

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(MemoryEntry::new(payload, ttl_secs, now));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(MemoryEntry::new(payload, ttl_secs, now));
                Ok(true)
            }
        }
    }

    fn set(&self, key: &str, ttl_secs: u32, payload: Bytes) -> Result<bool, ClientError> {
        self.check_request(key, Some(&payload))?;
        let now = self.clock.now();
        self.entries
            .insert(key.to_string(), MemoryEntry::new(payload, ttl_secs, now));
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<bool, ClientError> {
        self.check_request(key, None)?;
        let now = self.clock.now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired(now)))
    }
}

async fn run_expiry(store: Weak<MemoryStore>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let Some(store) = store.upgrade() else {
            debug!("Store dropped, stopping expiry task");
            return;
        };
        store.purge_expired();
    }
}

/// Enforce memcached key rules and the value size limit
fn check_limits(
    options: &StoreOptions,
    key: &str,
    payload: Option<&Bytes>,
) -> Result<(), ClientError> {
    if key.is_empty() || key.len() > options.max_key_size {
        return Err(ClientError::Protocol(format!(
            "CLIENT_ERROR key length {} outside 1..={}",
            key.len(),
            options.max_key_size
        )));
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ClientError::Protocol(
            "CLIENT_ERROR key contains whitespace or control characters".to_string(),
        ));
    }
    if let Some(payload) = payload
        && payload.len() > options.max_value
    {
        return Err(ClientError::Protocol(
            "SERVER_ERROR object too large for cache".to_string(),
        ));
    }
    Ok(())
}

/// A connection to a [`MemoryStore`].
///
/// Requests are checked against the client's own [`StoreOptions`] before
/// reaching the store, so a rejected request never counts as a store call.
#[derive(Debug)]
pub struct MemoryClient {
    store: Arc<MemoryStore>,
    endpoints: Vec<Endpoint>,
    options: StoreOptions,
    shut_down: AtomicBool,
}

impl MemoryClient {
    pub fn new(store: Arc<MemoryStore>, endpoints: Vec<Endpoint>) -> Self {
        Self {
            store,
            endpoints,
            options: StoreOptions::default(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Set the key and value size limits this client enforces
    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Endpoints this client was bound to
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn ensure_live(
        &self,
        key: &str,
        payload: Option<&Bytes>,
    ) -> Result<&MemoryStore, ClientError> {
        if self.is_shut_down() {
            return Err(ClientError::Shutdown);
        }
        check_limits(&self.options, key, payload)?;
        Ok(&self.store)
    }
}

#[async_trait::async_trait]
impl KeyValueStoreClient for MemoryClient {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, ClientError> {
        self.ensure_live(key, None)?.get(key)
    }

    async fn insert_if_absent(
        &self,
        key: &str,
        ttl_secs: u32,
        payload: Bytes,
    ) -> Result<bool, ClientError> {
        self.ensure_live(key, Some(&payload))?
            .add(key, ttl_secs, payload)
    }

    async fn set(&self, key: &str, ttl_secs: u32, payload: Bytes) -> Result<bool, ClientError> {
        self.ensure_live(key, Some(&payload))?
            .set(key, ttl_secs, payload)
    }

    async fn delete(&self, key: &str) -> Result<bool, ClientError> {
        self.ensure_live(key, None)?.delete(key)
    }

    async fn shutdown(&self) -> Result<(), ClientError> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector handing out clients for one shared [`MemoryStore`]
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

#[async_trait::async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(
        &self,
        endpoints: &[Endpoint],
        options: &StoreOptions,
    ) -> Result<Arc<dyn KeyValueStoreClient>, ClientError> {
        debug!(endpoints = endpoints.len(), "Connecting in-memory client");
        Ok(Arc::new(
            MemoryClient::new(self.store.clone(), endpoints.to_vec())
                .with_options(options.clone()),
        ))
    }
}
