//! # Persisted Fixed-Window Rate Limiter
//!
//! Admission control per `(action, identifier)` with windows stored in the
//! shared [`Storage`](crate::Storage), plus the periodic sweep that deletes
//! expired windows.
//!
//! ## Architecture
//!
//! ```text
//!     is_rate_limited ──┐
//!     record_action ────┼──► rate-limit-<ACTION>-<identifier>
//!     remaining_actions ┘          {count, resetTime}
//!                                          ▲
//!     cleanup thread ── every 5 min ───────┘ delete if now > resetTime
//! ```
//!
//! ## Failure Semantics
//!
//! The limiter fails open. A storage read error or an unparseable entry is
//! logged and the action is treated as not limited. The guarded actions are
//! low stakes, so availability wins over strictness.

use super::{
    config::{Action, RateLimitConfig, ANONYMOUS_IDENTIFIER},
    core::RateLimitEntry,
    metrics::{LimiterStats, WindowStatus},
    utils::SharedClock,
};
use crate::error::StorageError;
use crate::storage::{SharedStorage, RATE_LIMIT_KEY_PREFIX};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Fixed-window rate limiter over persisted counters.
///
/// Cheap to call: each operation reads (and at most writes) a single key.
/// Share it with `Arc` between the wishlist and the popularity store so both
/// draw from the same budget.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use wishrank::{Action, ManualClock, MemoryStorage, RateLimitConfig, RateLimiter};
///
/// let clock = ManualClock::new(0);
/// let limiter = RateLimiter::new(
///     Arc::new(MemoryStorage::new()),
///     Arc::new(clock.clone()),
///     RateLimitConfig::default(),
/// );
///
/// for _ in 0..10 {
///     assert!(!limiter.is_rate_limited(Action::WishlistActions));
///     limiter.record_action(Action::WishlistActions);
/// }
/// assert!(limiter.is_rate_limited(Action::WishlistActions));
///
/// clock.advance(60_001);
/// assert!(!limiter.is_rate_limited(Action::WishlistActions));
/// ```
pub struct RateLimiter {
    storage: SharedStorage,
    clock: SharedClock,
    config: RateLimitConfig,

    total_recorded: AtomicU64,
    total_limited: AtomicU64,
    total_cleaned: AtomicU64,
    storage_errors: AtomicU64,
}

impl RateLimiter {
    /// Creates a limiter over `storage`.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid (see [`RateLimitConfig::validate`]).
    pub fn new(storage: SharedStorage, clock: SharedClock, config: RateLimitConfig) -> Self {
        config.validate().expect("Invalid rate limit configuration");

        Self {
            storage,
            clock,
            config,
            total_recorded: AtomicU64::new(0),
            total_limited: AtomicU64::new(0),
            total_cleaned: AtomicU64::new(0),
            storage_errors: AtomicU64::new(0),
        }
    }

    /// The active configuration.
    #[inline]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Current time according to the limiter's clock.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// [`is_rate_limited_for`](Self::is_rate_limited_for) the anonymous identifier.
    #[inline]
    pub fn is_rate_limited(&self, action: Action) -> bool {
        self.is_rate_limited_for(action, ANONYMOUS_IDENTIFIER)
    }

    /// Returns `true` if `identifier` has spent its budget for `action` in the
    /// live window.
    ///
    /// An absent window is Open. An expired window is Open and is deleted on
    /// the spot. Storage or parse failures are logged and reported as Open.
    pub fn is_rate_limited_for(&self, action: Action, identifier: &str) -> bool {
        let key = action.storage_key(identifier);
        let now = self.now_ms();

        let entry = match self.load(&key) {
            Ok(Some(entry)) => entry,
            Ok(None) => return false,
            Err(e) => {
                self.storage_errors.fetch_add(1, Ordering::Relaxed);
                error!("Rate limit check error for {}: {}", key, e);
                return false;
            }
        };

        if entry.is_expired(now) {
            if let Err(e) = self.storage.remove(&key) {
                self.storage_errors.fetch_add(1, Ordering::Relaxed);
                error!("Failed to drop expired window {}: {}", key, e);
            }
            return false;
        }

        let limited = entry.is_limited(self.config.limit(action));
        if limited {
            self.total_limited.fetch_add(1, Ordering::Relaxed);
            debug!(
                "{} is limited ({}/{}, resets at {})",
                key,
                entry.count,
                self.config.limit(action),
                entry.reset_time
            );
        }
        limited
    }

    /// [`record_action_for`](Self::record_action_for) the anonymous identifier.
    #[inline]
    pub fn record_action(&self, action: Action) {
        self.record_action_for(action, ANONYMOUS_IDENTIFIER)
    }

    /// Counts one `action` for `identifier`.
    ///
    /// Starts a window of one if none is live, otherwise increments the live
    /// one. This does not check the limit; callers gate with
    /// [`is_rate_limited_for`](Self::is_rate_limited_for) first. An unreadable
    /// entry is replaced by a fresh window.
    pub fn record_action_for(&self, action: Action, identifier: &str) {
        let key = action.storage_key(identifier);
        let now = self.now_ms();
        let window = self.config.window_ms;

        let entry = match self.load(&key) {
            Ok(Some(entry)) => entry.record(now, window),
            Ok(None) => RateLimitEntry::first(now, window),
            Err(e) => {
                self.storage_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Replacing unreadable window {}: {}", key, e);
                RateLimitEntry::first(now, window)
            }
        };

        match self.store(&key, &entry) {
            Ok(()) => {
                self.total_recorded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.storage_errors.fetch_add(1, Ordering::Relaxed);
                error!("Rate limit recording error for {}: {}", key, e);
            }
        }
    }

    /// [`remaining_actions_for`](Self::remaining_actions_for) the anonymous identifier.
    #[inline]
    pub fn remaining_actions(&self, action: Action) -> u32 {
        self.remaining_actions_for(action, ANONYMOUS_IDENTIFIER)
    }

    /// Actions `identifier` may still perform in the live window.
    ///
    /// The full limit when no window is live or the entry cannot be read.
    pub fn remaining_actions_for(&self, action: Action, identifier: &str) -> u32 {
        self.status_for(action, identifier).remaining()
    }

    /// [`status_for`](Self::status_for) the anonymous identifier.
    pub fn status(&self, action: Action) -> WindowStatus {
        self.status_for(action, ANONYMOUS_IDENTIFIER)
    }

    /// Snapshot of the window for `(action, identifier)`. Never mutates storage.
    pub fn status_for(&self, action: Action, identifier: &str) -> WindowStatus {
        let key = action.storage_key(identifier);
        let now = self.now_ms();

        let live = match self.load(&key) {
            Ok(entry) => entry.filter(|e| !e.is_expired(now)),
            Err(e) => {
                self.storage_errors.fetch_add(1, Ordering::Relaxed);
                error!("Rate limit status error for {}: {}", key, e);
                None
            }
        };

        WindowStatus {
            action,
            identifier: identifier.to_string(),
            count: live.map(|e| e.count).unwrap_or(0),
            limit: self.config.limit(action),
            reset_time_ms: live.map(|e| e.reset_time),
        }
    }

    /// Deletes every rate-limit entry whose window has ended.
    ///
    /// Entries that cannot be parsed are deleted too, since they can never
    /// limit anything. Returns the number of keys removed; failures are logged
    /// and end the sweep early.
    pub fn cleanup(&self) -> usize {
        let now = self.now_ms();

        let keys = match self.storage.keys() {
            Ok(keys) => keys,
            Err(e) => {
                self.storage_errors.fetch_add(1, Ordering::Relaxed);
                error!("Rate limit cleanup error: {}", e);
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys.iter().filter(|k| k.starts_with(RATE_LIMIT_KEY_PREFIX)) {
            let stale = match self.load(key) {
                Ok(Some(entry)) => entry.is_expired(now),
                Ok(None) => false,
                Err(e) => {
                    debug!("Sweeping unreadable window {}: {}", key, e);
                    true
                }
            };

            if !stale {
                continue;
            }

            if let Err(e) = self.storage.remove(key) {
                self.storage_errors.fetch_add(1, Ordering::Relaxed);
                error!("Rate limit cleanup error for {}: {}", key, e);
                break;
            }
            removed += 1;
        }

        if removed > 0 {
            self.total_cleaned.fetch_add(removed as u64, Ordering::Relaxed);
            debug!("Cleanup removed {} expired rate limit windows", removed);
        }
        removed
    }

    /// Runs one sweep, then starts the periodic sweep thread.
    ///
    /// See [`start_cleanup_thread`](Self::start_cleanup_thread) for the return value.
    pub fn initialize(self: Arc<Self>) -> io::Result<(thread::JoinHandle<()>, mpsc::Sender<()>)> {
        self.cleanup();
        self.start_cleanup_thread()
    }

    /// Starts a stoppable thread sweeping every `cleanup_interval_ms`.
    ///
    /// # Returns
    ///
    /// A tuple of:
    /// - `JoinHandle` for the cleanup thread
    /// - `Sender` to signal the thread to stop (dropping it stops the thread too)
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn start_cleanup_thread(
        self: Arc<Self>,
    ) -> io::Result<(thread::JoinHandle<()>, mpsc::Sender<()>)> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let limiter = self;
        let interval = Duration::from_millis(limiter.config.cleanup_interval_ms);

        let handle = thread::Builder::new()
            .name("wishrank-cleanup".to_string())
            .spawn(move || {
                info!(
                    "Started rate limit cleanup thread (interval: {}ms)",
                    limiter.config.cleanup_interval_ms
                );

                loop {
                    match stop_rx.recv_timeout(interval) {
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                            info!("Rate limit cleanup thread stopping");
                            break;
                        }
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            limiter.cleanup();
                        }
                    }
                }
            })?;

        Ok((handle, stop_tx))
    }

    /// Lifetime counters of this handle.
    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            total_recorded: self.total_recorded.load(Ordering::Relaxed),
            total_limited: self.total_limited.load(Ordering::Relaxed),
            total_cleaned: self.total_cleaned.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
        }
    }

    fn load(&self, key: &str) -> Result<Option<RateLimitEntry>, StorageError> {
        match self.storage.get(key)? {
            Some(raw) => Ok(Some(RateLimitEntry::from_json(&raw)?)),
            None => Ok(None),
        }
    }

    fn store(&self, key: &str, entry: &RateLimitEntry) -> Result<(), StorageError> {
        self.storage.set(key, &entry.to_json()?)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
