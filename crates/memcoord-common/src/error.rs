//! Error types and error codes for memcoord
//!
//! This module defines:
//! - `StoreError`: errors surfaced by cache and lock components to callers
//! - `ClientError`: errors raised by a `KeyValueStoreClient` implementation
//! - `CodecError`: value encoding / payload decoding failures

/// Stable error codes carried by [`StoreError`]
pub mod codes {
    pub const NO_CONNECTION: &str = "NO_CONNECTION";
    pub const INVALID_CONFIG: &str = "INVALID_CONFIG";
    pub const CONNECT_FAILED: &str = "CONNECT_FAILED";
    pub const NOT_OPENED: &str = "NOT_OPENED";
    pub const STORE_FAILED: &str = "STORE_FAILED";
    pub const SERIALIZATION: &str = "SERIALIZATION";
    pub const LOCK_TIMEOUT: &str = "LOCK_TIMEOUT";
}

/// Error type for key-value store client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request timeout")]
    Timeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The store refused a conditional write because the key already exists.
    #[error("not stored")]
    NotStored,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("client has been shut down")]
    Shutdown,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Error type for value encoding and payload decoding
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("value cannot be encoded as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Errors returned by cache and lock components
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("[{code}] {message}")]
    Configuration {
        correlation_id: Option<String>,
        code: &'static str,
        message: String,
    },

    #[error("[CONNECT_FAILED] cannot connect to {endpoints} endpoint(s): {source}")]
    Connection {
        correlation_id: Option<String>,
        endpoints: usize,
        #[source]
        source: ClientError,
    },

    #[error("[NOT_OPENED] Connection is not opened")]
    InvalidState { correlation_id: Option<String> },

    #[error("[STORE_FAILED] {operation} '{key}' failed: {source}")]
    StoreOperation {
        correlation_id: Option<String>,
        operation: &'static str,
        key: String,
        #[source]
        source: ClientError,
    },

    #[error("[SERIALIZATION] {source}")]
    Serialization {
        correlation_id: Option<String>,
        #[source]
        source: CodecError,
    },

    #[error("[LOCK_TIMEOUT] Acquiring lock {key} failed on timeout")]
    LockTimeout {
        correlation_id: Option<String>,
        key: String,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn no_connection(correlation_id: Option<&str>) -> Self {
        Self::Configuration {
            correlation_id: correlation_id.map(str::to_owned),
            code: codes::NO_CONNECTION,
            message: "Connection is not configured".to_string(),
        }
    }

    pub fn invalid_config(correlation_id: Option<&str>, message: impl Into<String>) -> Self {
        Self::Configuration {
            correlation_id: correlation_id.map(str::to_owned),
            code: codes::INVALID_CONFIG,
            message: message.into(),
        }
    }

    pub fn connection(correlation_id: Option<&str>, endpoints: usize, source: ClientError) -> Self {
        Self::Connection {
            correlation_id: correlation_id.map(str::to_owned),
            endpoints,
            source,
        }
    }

    pub fn not_opened(correlation_id: Option<&str>) -> Self {
        Self::InvalidState {
            correlation_id: correlation_id.map(str::to_owned),
        }
    }

    pub fn store_operation(
        correlation_id: Option<&str>,
        operation: &'static str,
        key: &str,
        source: ClientError,
    ) -> Self {
        Self::StoreOperation {
            correlation_id: correlation_id.map(str::to_owned),
            operation,
            key: key.to_string(),
            source,
        }
    }

    pub fn serialization(correlation_id: Option<&str>, source: impl Into<CodecError>) -> Self {
        Self::Serialization {
            correlation_id: correlation_id.map(str::to_owned),
            source: source.into(),
        }
    }

    pub fn lock_timeout(correlation_id: Option<&str>, key: &str) -> Self {
        Self::LockTimeout {
            correlation_id: correlation_id.map(str::to_owned),
            key: key.to_string(),
        }
    }

    /// Stable error code for programmatic matching
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { code, .. } => *code,
            Self::Connection { .. } => codes::CONNECT_FAILED,
            Self::InvalidState { .. } => codes::NOT_OPENED,
            Self::StoreOperation { .. } => codes::STORE_FAILED,
            Self::Serialization { .. } => codes::SERIALIZATION,
            Self::LockTimeout { .. } => codes::LOCK_TIMEOUT,
        }
    }

    /// The correlation id of the call that produced this error, if any
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::Configuration { correlation_id, .. }
            | Self::Connection { correlation_id, .. }
            | Self::InvalidState { correlation_id }
            | Self::StoreOperation { correlation_id, .. }
            | Self::Serialization { correlation_id, .. }
            | Self::LockTimeout { correlation_id, .. } => correlation_id.as_deref(),
        }
    }

    /// Check if the failed operation may succeed when issued again.
    ///
    /// Only store timeouts qualify; nothing in this crate retries automatically.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::StoreOperation {
                source: ClientError::Timeout,
                ..
            }
        )
    }
}
