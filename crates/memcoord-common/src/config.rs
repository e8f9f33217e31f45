//! Connection and option configuration for cache and lock components
//!
//! A [`StoreConfig`] can be built in code, parsed from a `host[:port]` list,
//! or loaded from a config file layered with `MEMCOORD__*` environment
//! variables.

use std::fmt;
use std::path::Path;

use config::{Config, Environment};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Conventional memcached port, used when an endpoint omits one
pub const DEFAULT_PORT: u16 = 11211;

/// Default interval between lock acquisition attempts, in milliseconds
pub const DEFAULT_RETRY_TIMEOUT_MS: u64 = 100;

/// Prefix for environment variable overrides (`MEMCOORD__OPTIONS__TIMEOUT=...`)
pub const ENV_PREFIX: &str = "memcoord";

/// A single store server endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
}

impl Endpoint {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            port: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Effective port, falling back to [`DEFAULT_PORT`]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// `host:port` address string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port())
    }

    /// Parse a `host[:port]` string. A `memcached://` or `tcp://` scheme
    /// prefix is accepted and stripped.
    pub fn parse(addr: &str) -> Result<Self> {
        let addr = addr
            .trim()
            .trim_start_matches("memcached://")
            .trim_start_matches("tcp://")
            .trim_end_matches('/');

        if addr.is_empty() {
            return Err(StoreError::invalid_config(None, "Empty endpoint address"));
        }

        match addr.rsplit_once(':') {
            Some((host, port)) => {
                let port: u16 = port.parse().map_err(|_| {
                    StoreError::invalid_config(None, format!("Invalid port in address: {}", addr))
                })?;
                if host.is_empty() {
                    return Err(StoreError::invalid_config(
                        None,
                        format!("Missing host in address: {}", addr),
                    ));
                }
                Ok(Self::new(host).with_port(port))
            }
            None => Ok(Self::new(addr)),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address())
    }
}

/// Client and lock tuning options
///
/// Apart from `retry_timeout`, options are handed verbatim to the
/// [`StoreConnector`](crate::traits::StoreConnector) that builds the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Interval between lock acquisition attempts, in milliseconds
    pub retry_timeout: u64,
    /// Client network timeout, in milliseconds
    pub timeout: u64,
    pub max_key_size: usize,
    /// Longest TTL in seconds the store treats as relative
    pub max_expiration: u32,
    /// Largest payload in bytes the store accepts
    pub max_value: usize,
    pub pool_size: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            retry_timeout: DEFAULT_RETRY_TIMEOUT_MS,
            timeout: 5000,
            max_key_size: 250,
            max_expiration: 2_592_000,
            max_value: 1_048_576,
            pool_size: 5,
        }
    }
}

/// Configuration shared by cache and lock components
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Single endpoint shorthand
    #[serde(default)]
    pub connection: Option<Endpoint>,
    #[serde(default)]
    pub connections: Vec<Endpoint>,
    /// Comma-separated `host[:port]` list, merged into `connections` on load
    #[serde(default, skip_serializing)]
    pub servers: Option<String>,
    #[serde(default)]
    pub options: StoreOptions,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config from a comma-separated `host[:port]` list
    pub fn from_addrs(addrs: &str) -> Result<Self> {
        let connections = parse_addrs(addrs)?;
        Ok(Self {
            connections,
            ..Default::default()
        })
    }

    /// Load configuration from an optional file plus environment overrides.
    ///
    /// Environment variables use the `MEMCOORD__` prefix and `__` as the
    /// nesting separator, e.g. `MEMCOORD__SERVERS=cache1:11211,cache2`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let mut loaded: StoreConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| StoreError::invalid_config(None, e.to_string()))?;

        if let Some(servers) = loaded.servers.take() {
            loaded.connections.extend(parse_addrs(&servers)?);
        }

        tracing::debug!(
            endpoints = loaded.endpoints().len(),
            "Store configuration loaded"
        );

        Ok(loaded)
    }

    /// Add an endpoint
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.connections.push(endpoint);
        self
    }

    /// Set tuning options
    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the lock retry interval in milliseconds
    pub fn with_retry_timeout(mut self, retry_timeout_ms: u64) -> Self {
        self.options.retry_timeout = retry_timeout_ms;
        self
    }

    /// All configured endpoints, `connection` first, skipping blank hosts
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.connection
            .iter()
            .chain(self.connections.iter())
            .filter(|e| !e.host.trim().is_empty())
            .cloned()
            .collect()
    }
}

fn parse_addrs(addrs: &str) -> Result<Vec<Endpoint>> {
    addrs
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(Endpoint::parse)
        .collect()
}
