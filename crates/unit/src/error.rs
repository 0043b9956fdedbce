use std::error::Error;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport can't allocate request handle: {reason}")]
    Allocate { reason: String },

    #[error("transport rejected {op}: {reason}")]
    Rejected { op: &'static str, reason: String },
}

impl TransportError {
    pub fn allocate<S: ToString>(str: S) -> Self {
        Self::Allocate { reason: str.to_string() }
    }

    pub fn rejected<S: ToString>(op: &'static str, str: S) -> Self {
        Self::Rejected { op, reason: str.to_string() }
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },

    #[error("no shared memory ack received within {waited:?}")]
    AckTimeout { waited: Duration },

    #[error("header field too large: {reason}")]
    FieldTooLarge { reason: String },
}

impl WriteError {
    pub fn field_too_large<S: ToString>(str: S) -> Self {
        Self::FieldTooLarge { reason: str.to_string() }
    }

    pub fn ack_timeout(waited: Duration) -> Self {
        Self::AckTimeout { waited }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("request handle error: {source}")]
    Handle {
        #[from]
        source: TransportError,
    },

    #[error("response write error: {source}")]
    Write {
        #[from]
        source: WriteError,
    },

    #[error("handler error: {source}")]
    Handler { source: Box<dyn Error + Send + Sync> },
}

impl DispatchError {
    pub fn handler<E: Into<Box<dyn Error + Send + Sync>>>(e: E) -> Self {
        Self::Handler { source: e.into() }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("pool capacity must be at least 1")]
    InvalidPoolCapacity,

    #[error("writer chunk size must be at least 1")]
    InvalidChunkSize,

    #[error("cache bound must be at least 1 entry, current: {max_entries}")]
    InvalidCacheBound { max_entries: usize },
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid config: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("can't prefill handle pool: {source}")]
    Prefill {
        #[from]
        source: TransportError,
    },
}
