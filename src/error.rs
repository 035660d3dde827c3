//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.
//!
//! Propagation policy: read paths never surface these errors for ordinary
//! absence, expiry or corruption - they degrade to a miss. Only capacity
//! failures and explicit I/O failures on writes reach callers.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A write could not fit even after eviction; prior state is unchanged
    #[error("Capacity exceeded: needed {requested} bytes, eviction freed {freed}")]
    CapacityExceeded {
        /// Bytes the eviction pass was asked to free
        requested: u64,
        /// Bytes the eviction pass actually freed
        freed: u64,
    },

    /// A disk-tier write was attempted without a configured disk root
    #[error("Tier unavailable: {0}")]
    TierUnavailable(String),

    /// Invalid key (empty, or exceeds the maximum key length)
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Underlying disk operation failed (write paths only)
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Value or metadata could not be serialized
    #[error("Serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
