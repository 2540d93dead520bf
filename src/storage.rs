//! # Persisted Key-Value Storage
//!
//! Every piece of state in this crate lives in a flat string key-value store:
//! the popularity map, one entry per rate-limit window and the saved-item list.
//! Components depend on the [`Storage`] trait only, so the browser-profile
//! store of a real client and the in-memory [`MemoryStorage`] used by tests and
//! demos are interchangeable.
//!
//! ## Sharing Model
//!
//! ```text
//!     Tab A ──┐                        ┌──► bali-yoga-popularity-scores
//!             ├──► Storage (shared) ───┼──► rate-limit-<ACTION>-<id>
//!     Tab B ──┘     no locks           └──► bali-yoga-wishlist
//! ```
//!
//! Handles never coordinate. Two handles doing read-modify-write on the same
//! key can lose an update; see [`PopularityStore`](crate::PopularityStore).

use crate::error::StorageError;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Key holding the popularity map.
pub const POPULARITY_SCORES_KEY: &str = "bali-yoga-popularity-scores";

/// Key holding the saved-item list.
pub const WISHLIST_KEY: &str = "bali-yoga-wishlist";

/// Prefix shared by every rate-limit entry key.
pub const RATE_LIMIT_KEY_PREFIX: &str = "rate-limit-";

/// Key used by the quota probe in [`secure_set`].
pub const QUOTA_PROBE_KEY: &str = "storage-test";

/// Size of the value written by the quota probe.
pub const QUOTA_PROBE_BYTES: usize = 1024;

/// A flat string key-value store.
///
/// Implementations must be safe to share across threads because the rate
/// limit sweep runs on its own timer thread.
pub trait Storage: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Lists every key currently stored.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// A storage handle shared by all components of one client.
pub type SharedStorage = Arc<dyn Storage>;

/// Reads `key`, logging and swallowing backend errors.
pub(crate) fn secure_get(storage: &dyn Storage, key: &str) -> Option<String> {
    match storage.get(key) {
        Ok(value) => value,
        Err(e) => {
            error!("Storage read failed for {}: {}", key, e);
            None
        }
    }
}

/// Writes `value` under `key` after probing for free space.
///
/// A 1 KiB probe value is written and removed first, so a nearly full store
/// rejects the write before the real key is touched. Returns `false` on any
/// failure; the error is logged.
pub fn secure_set(storage: &dyn Storage, key: &str, value: &str) -> bool {
    let probe = "x".repeat(QUOTA_PROBE_BYTES);

    let result = storage
        .set(QUOTA_PROBE_KEY, &probe)
        .and_then(|()| storage.remove(QUOTA_PROBE_KEY))
        .and_then(|()| storage.set(key, value));

    match result {
        Ok(()) => true,
        Err(e) => {
            error!("Storage write failed for {}: {}", key, e);
            // A failed real write can leave the probe behind.
            let _ = storage.remove(QUOTA_PROBE_KEY);
            false
        }
    }
}

/// In-memory [`Storage`] backed by a concurrent map.
///
/// Cloning yields another handle onto the same contents, the way two browser
/// tabs see the same profile storage. An optional byte quota (keys plus values)
/// makes writes fail with [`StorageError::QuotaExceeded`] once exhausted.
///
/// # Example
///
/// ```rust
/// use wishrank::{MemoryStorage, Storage};
///
/// let tab_a = MemoryStorage::new();
/// let tab_b = tab_a.clone();
///
/// tab_a.set("greeting", "hello").unwrap();
/// assert_eq!(tab_b.get("greeting").unwrap().as_deref(), Some("hello"));
/// ```
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<DashMap<String, String, ahash::RandomState>>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    /// Creates an empty, unbounded store.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::with_hasher(ahash::RandomState::new())),
            quota_bytes: None,
        }
    }

    /// Creates an empty store that refuses writes beyond `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::new()
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes currently used (sum of key and value lengths).
    pub fn used_bytes(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.key().len() + entry.value().len())
            .sum()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|value| value.clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota_bytes {
            let replaced = self
                .entries
                .get(key)
                .map(|old| key.len() + old.len())
                .unwrap_or(0);
            let available = quota.saturating_sub(self.used_bytes().saturating_sub(replaced));
            let needed = key.len() + value.len();

            if needed > available {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available,
                });
            }
        }

        self.entries.insert(key.to_string(), value.to_string());
        debug!("Stored {} ({} bytes)", key, value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.iter().map(|entry| entry.key().clone()).collect())
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("keys", &self.len())
            .field("used_bytes", &self.used_bytes())
            .field("quota_bytes", &self.quota_bytes)
            .finish()
    }
}
