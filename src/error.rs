//! # Storage Errors
//!
//! Failures raised at the storage seam. None of these cross the public
//! wishlist/popularity/limiter operations: callers there see `false`, `0`
//! or an empty collection, and the error itself is logged.

use thiserror::Error;

/// Error returned by a [`Storage`](crate::Storage) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The write would exceed the backend's quota.
    #[error("storage quota exceeded writing {key} ({needed} bytes, {available} available)")]
    QuotaExceeded {
        /// Key being written.
        key: String,
        /// Bytes the write needed.
        needed: usize,
        /// Bytes still free before the write.
        available: usize,
    },

    /// The backend could not be reached or refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A persisted value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
