//! Memcoord Client - caching and locking over a shared key-value store
//!
//! This crate provides:
//! - `KvCache`: a TTL value cache with type-aware value encoding
//! - `KvLock`: a distributed lock built on atomic insert-if-absent
//! - `acquire_lock`: a retrying acquire usable with any `Lock`
//! - `MemoryStore`: an in-memory store with memcached semantics
//!
//! Components follow a `closed -> open -> closed` lifecycle through
//! [`Openable`](memcoord_common::Openable); every operation takes an optional
//! correlation id that is only used for tracing and error context.

pub mod cache;
pub mod codec;
pub mod connection;
pub mod lock;
pub mod memory;
pub mod metrics;

pub use cache::KvCache;
pub use codec::{CacheEncode, Json};
pub use connection::StoreConnection;
pub use lock::{KvLock, Lock, acquire_lock};
pub use memory::{Clock, ManualClock, MemoryConnector, MemoryStore, SystemClock};

// Common re-exports
pub use memcoord_common::{
    ClientError, Endpoint, KeyValueStoreClient, Openable, StoreConfig, StoreConnector,
    StoreError, StoreOptions,
};

/// Convert a millisecond timeout into the whole seconds a store TTL takes.
///
/// The sub-second remainder is discarded; values beyond `u32::MAX` seconds
/// saturate.
pub(crate) fn ttl_seconds(ttl_ms: u64) -> u32 {
    u32::try_from(ttl_ms / 1000).unwrap_or(u32::MAX)
}
