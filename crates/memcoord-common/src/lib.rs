//! Memcoord Common - shared types for store-backed caches and locks
//!
//! This crate provides:
//! - The error taxonomy returned by cache and lock components
//! - Endpoint and option configuration
//! - Traits for the key-value client, its connector, and endpoint resolution

pub mod config;
pub mod error;
pub mod traits;

pub use config::{DEFAULT_PORT, Endpoint, StoreConfig, StoreOptions};
pub use error::{ClientError, CodecError, Result, StoreError};
pub use traits::{
    ConnectionResolver, KeyValueStoreClient, Openable, StaticConnectionResolver, StoreConnector,
};
