//! Configuration for the writer, the handle pool and the response cache.
//!
//! All structures deserialize with serde and fall back to their defaults for
//! missing fields, so a partial document like `{"pool": {"capacity": 32}}`
//! is a valid configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Transport sized chunk offered to the shared buffer in one call.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

pub const DEFAULT_POOL_CAPACITY: usize = 10;

/// Freshness window of cached responses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;

pub const DEFAULT_CACHE_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    pub writer: WriterConfig,
    pub pool: PoolConfig,
    pub cache: CacheConfig,
}

impl UnitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.writer.validate()?;
        self.pool.validate()?;
        self.cache.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    pub chunk_size: usize,
    /// Bound on a single wait for shared memory ack. `None` waits forever.
    pub ack_timeout_ms: Option<u64>,
}

impl WriterConfig {
    pub fn ack_timeout(&self) -> Option<Duration> {
        self.ack_timeout_ms.map(Duration::from_millis)
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        Ok(())
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, ack_timeout_ms: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub capacity: usize,
    /// Allocate `capacity` handles when the dispatcher is built.
    pub prefill: bool,
}

impl PoolConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::InvalidPoolCapacity);
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { capacity: DEFAULT_POOL_CAPACITY, prefill: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: usize,
    /// Responses with a larger body are served but never cached.
    pub max_body_bytes: usize,
    /// Period of the background sweep of expired entries. `None` relies on lazy expiry only.
    pub sweep_interval_secs: Option<u64>,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_secs.map(Duration::from_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.max_entries == 0 {
            return Err(ConfigError::InvalidCacheBound { max_entries: self.max_entries });
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            max_body_bytes: DEFAULT_CACHE_MAX_BODY_BYTES,
            sweep_interval_secs: None,
        }
    }
}
