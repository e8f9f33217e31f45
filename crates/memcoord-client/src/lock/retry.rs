use std::time::Duration;

use memcoord_common::{Result, StoreError};
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use super::Lock;

/// Acquire a lock, retrying until it succeeds or `timeout_ms` elapses.
///
/// Attempts are spaced by [`Lock::retry_interval`]. `timeout_ms = 0` makes a
/// single attempt. The deadline is checked between attempts only: an attempt
/// already in flight is not cancelled, so the call can overrun `timeout_ms`
/// by up to one attempt's duration.
///
/// Store errors from any attempt are returned immediately; giving up on
/// timeout returns [`StoreError::LockTimeout`]. A timeout too large to
/// represent as a deadline retries without limit.
pub async fn acquire_lock<L: Lock + ?Sized>(
    lock: &L,
    correlation_id: Option<&str>,
    key: &str,
    ttl_ms: u64,
    timeout_ms: u64,
) -> Result<()> {
    let deadline = Instant::now().checked_add(Duration::from_millis(timeout_ms));
    let mut attempts: u32 = 0;

    loop {
        attempts = attempts.saturating_add(1);
        if lock.try_acquire_lock(correlation_id, key, ttl_ms).await? {
            debug!(correlation_id, key, attempts, "Lock acquired");
            return Ok(());
        }

        let remaining = deadline.map_or(Duration::MAX, |deadline| {
            deadline.saturating_duration_since(Instant::now())
        });
        if remaining.is_zero() {
            warn!(correlation_id, key, attempts, timeout_ms, "Lock acquisition timed out");
            return Err(StoreError::lock_timeout(correlation_id, key));
        }

        sleep(lock.retry_interval().min(remaining)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use memcoord_common::{ClientError, error::codes};

    use super::*;

    /// Lock that is contended for the first `busy_for` attempts
    struct ScriptedLock {
        busy_for: u32,
        attempts: AtomicU32,
        fail: bool,
    }

    impl ScriptedLock {
        fn new(busy_for: u32) -> Self {
            Self {
                busy_for,
                attempts: AtomicU32::new(0),
                fail: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl Lock for ScriptedLock {
        fn retry_interval(&self) -> Duration {
            Duration::from_millis(50)
        }

        async fn try_acquire_lock(
            &self,
            correlation_id: Option<&str>,
            key: &str,
            _ttl_ms: u64,
        ) -> Result<bool> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StoreError::store_operation(
                    correlation_id,
                    "acquire",
                    key,
                    ClientError::Timeout,
                ));
            }
            Ok(n >= self.busy_for)
        }

        async fn release_lock(&self, _correlation_id: Option<&str>, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquires_after_retries() {
        let lock = ScriptedLock::new(3);
        acquire_lock(&lock, None, "k", 1000, 1000).await.unwrap();
        assert_eq!(lock.attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let lock = ScriptedLock::new(u32::MAX);
        let started = Instant::now();

        let err = acquire_lock(&lock, Some("t"), "k", 1000, 120).await.unwrap_err();
        assert_eq!(err.code(), codes::LOCK_TIMEOUT);
        assert_eq!(err.correlation_id(), Some("t"));

        // Attempts at 0ms, 50ms, 100ms and a final one at the 120ms deadline
        assert_eq!(lock.attempts.load(Ordering::SeqCst), 4);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(120));
        assert!(elapsed < Duration::from_millis(170));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_makes_one_attempt() {
        let lock = ScriptedLock::new(u32::MAX);
        let err = acquire_lock(&lock, None, "k", 1000, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout { .. }));
        assert_eq!(lock.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_error_is_not_retried() {
        let lock = ScriptedLock {
            fail: true,
            ..ScriptedLock::new(0)
        };
        let err = acquire_lock(&lock, None, "k", 1000, 10_000).await.unwrap_err();
        assert_eq!(err.code(), codes::STORE_FAILED);
        assert_eq!(lock.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_keeps_retrying() {
        let lock = ScriptedLock::new(5);
        acquire_lock(&lock, None, "k", 1000, u64::MAX).await.unwrap();
        assert_eq!(lock.attempts.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_works_with_trait_objects() {
        let lock: Box<dyn Lock> = Box::new(ScriptedLock::new(0));
        acquire_lock(lock.as_ref(), None, "k", 1000, 0).await.unwrap();
    }
}
