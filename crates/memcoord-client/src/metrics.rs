// Metrics for cache and lock operations
// Recorded through the `metrics` facade; installing an exporter is up to the application

use metrics::{counter, describe_counter};

pub const CACHE_REQUESTS_TOTAL: &str = "memcoord_cache_requests_total";
pub const LOCK_ACQUIRE_TOTAL: &str = "memcoord_lock_acquire_total";
pub const LOCK_RELEASE_TOTAL: &str = "memcoord_lock_release_total";

/// Register metric descriptions.
/// Call once at startup, after the recorder is installed
pub fn describe_metrics() {
    describe_counter!(
        CACHE_REQUESTS_TOTAL,
        "Total number of cache requests by operation and outcome"
    );
    describe_counter!(
        LOCK_ACQUIRE_TOTAL,
        "Total number of single lock acquisition attempts by outcome"
    );
    describe_counter!(LOCK_RELEASE_TOTAL, "Total number of lock releases");
}

/// Outcome of a single lock acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired,
    Contended,
    Error,
}

impl AcquireOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcquireOutcome::Acquired => "acquired",
            AcquireOutcome::Contended => "contended",
            AcquireOutcome::Error => "error",
        }
    }
}

/// Record a cache request; `outcome` is one of `hit`, `miss`, `ok`, `error`
pub fn record_cache_request(operation: &'static str, outcome: &'static str) {
    counter!(CACHE_REQUESTS_TOTAL, "operation" => operation, "outcome" => outcome).increment(1);
}

/// Record a lock acquisition attempt
pub fn record_lock_acquire(outcome: AcquireOutcome) {
    counter!(LOCK_ACQUIRE_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

/// Record a lock release
pub fn record_lock_release() {
    counter!(LOCK_RELEASE_TOTAL).increment(1);
}
