//! Distributed locks
//!
//! - [`Lock`]: single-attempt acquire and release primitives
//! - [`acquire_lock`]: retrying acquire, generic over any [`Lock`]
//! - [`KvLock`]: lock backed by the store's atomic insert-if-absent

mod kv_lock;
mod retry;

use std::time::Duration;

use memcoord_common::Result;

pub use kv_lock::{KvLock, LOCK_SENTINEL};
pub use retry::acquire_lock;

/// Default interval between acquisition attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Single-attempt lock primitives
#[async_trait::async_trait]
pub trait Lock: Send + Sync {
    /// Interval [`acquire_lock`] sleeps between attempts
    fn retry_interval(&self) -> Duration {
        DEFAULT_RETRY_INTERVAL
    }

    /// Make a single attempt to acquire a lock, returning immediately.
    ///
    /// `Ok(false)` means the lock is held by someone else.
    async fn try_acquire_lock(
        &self,
        correlation_id: Option<&str>,
        key: &str,
        ttl_ms: u64,
    ) -> Result<bool>;

    /// Release a lock by key
    async fn release_lock(&self, correlation_id: Option<&str>, key: &str) -> Result<()>;
}
