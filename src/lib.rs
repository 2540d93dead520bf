//! # Wishrank - Popularity-Ranked Wishlists
//!
//! Saved-item lists for a studio and retreat directory, where every save nudges
//! the item up the listings. Visitors bookmark studios and retreats; each
//! bookmark bumps a persisted popularity counter; listings are ordered by
//! quality rating plus a small, logarithmic popularity boost. A fixed-window
//! rate limiter keeps scripted clicking from inflating the counters.
//!
//! ## How Ranking Works
//!
//! ```text
//!     score = rating + ln(saves + 1) * 0.1
//!
//!     Bamboo Yoga   rating 4.4, 2 saves  ──► 4.4 + 0.110 = 4.510  ┐ within 0.01:
//!     Alpha Shala   rating 4.5, 0 saves  ──► 4.5 + 0.000 = 4.500  ┘ more saves first
//!
//!     Result: [Bamboo Yoga, Alpha Shala]
//! ```
//!
//! Scores closer than `0.01` are ties, broken by popularity, then rating, then
//! name.
//!
//! ## Quick Start
//!
//! ```rust
//! use wishrank::{CatalogItem, ItemType, NewSavedItem, WishlistBuilder};
//!
//! let wishlist = WishlistBuilder::new().build();
//!
//! let bamboo = NewSavedItem::new("bamboo", "Bamboo Yoga", "bamboo-yoga", ItemType::Studio)
//!     .with_rating(4.4);
//! assert!(wishlist.add_to_wishlist(bamboo));
//! assert!(wishlist.is_in_wishlist("bamboo"));
//!
//! let catalog = vec![
//!     CatalogItem::new("alpha", "Alpha Shala", 4.5),
//!     CatalogItem::new("bamboo", "Bamboo Yoga", 4.4),
//! ];
//! let ranked = wishlist.sort_by_popularity_and_rating(&catalog);
//! assert_eq!(ranked[0].id, "alpha"); // one save is not enough to overtake
//! ```
//!
//! ## Architecture Overview
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │   Your Application      │
//!                    └──────────┬──────────────┘
//!                               │
//!                    ┌──────────▼──────────────┐
//!                    │        Wishlist         │
//!                    ├─────────────────────────┤
//!                    │  • add / remove         │
//!                    │  • is_in / clear        │
//!                    │  • sort listings        │
//!                    └──────────┬──────────────┘
//!                               │
//!           ┌───────────────────┼────────────────────┐
//!           │                   │                    │
//!     ┌─────▼──────┐    ┌───────▼────────┐    ┌──────▼───────┐
//!     │ Validator  │    │  RateLimiter   │    │ Popularity   │
//!     ├────────────┤    ├────────────────┤    ├──────────────┤
//!     │ • ids      │    │ • 10 saves/min │    │ • 0..=10000  │
//!     │ • strings  │    │ • fail-open    │    │ • RMW, no    │
//!     │ • scores   │    │ • 5 min sweep  │    │   locking    │
//!     └────────────┘    └───────┬────────┘    └──────┬───────┘
//!                               │                    │
//!                    ┌──────────▼────────────────────▼──┐
//!                    │   Storage (get/set/remove/keys)  │
//!                    └──────────────────────────────────┘
//! ```
//!
//! ## Persisted State
//!
//! | Key | Value |
//! |-----|-------|
//! | `bali-yoga-popularity-scores` | `{ "<id>": <count> }` |
//! | `bali-yoga-wishlist` | `[SavedItem, ...]`, most recent first |
//! | `rate-limit-<ACTION>-<identifier>` | `{ "count": n, "resetTime": ms }` |
//!
//! ## Failure Model
//!
//! Public operations never panic and never return errors. Invalid input,
//! rate-limit rejections and storage failures are logged through `tracing` and
//! surface as `false`, `0` or an empty collection. The rate limiter fails
//! open.
//!
//! ## Sharing Storage
//!
//! Several handles may share one [`Storage`], the way browser tabs share a
//! profile. The popularity counters are updated with an unguarded
//! read-modify-write, so concurrent handles can lose updates; treat counts as
//! advisory.
//!
//! ## Examples
//!
//! See the `demos/` directory:
//! - `basic.rs` - Saving, ranking and hitting the rate limit
//! - `shared_storage.rs` - Two handles over one storage with the cleanup sweep

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    missing_debug_implementations
)]
#![forbid(unsafe_code)]

mod error;
mod popularity;
mod rate_limiter;
mod ranking;
mod storage;
mod validate;
mod wishlist;

pub use error::StorageError;

pub use popularity::{PopularityScores, PopularityStore};

pub use rate_limiter::{
    current_time_ms, Action, Clock, LimiterStats, ManualClock, RateLimitConfig, RateLimitEntry,
    RateLimiter, SharedClock, SystemClock, WindowState, WindowStatus, ANONYMOUS_IDENTIFIER,
    DEFAULT_CLEANUP_INTERVAL_MS, DEFAULT_WINDOW_MS,
};

pub use ranking::{
    calculate_popularity_boost, locale_cmp, popularity_of, ranking_score, sort_by_popularity,
    sort_by_popularity_and_rating, CatalogItem, Rankable, POPULARITY_BOOST_FACTOR,
    SCORE_TIE_EPSILON,
};

pub use storage::{
    secure_set, MemoryStorage, SharedStorage, Storage, POPULARITY_SCORES_KEY,
    QUOTA_PROBE_BYTES, QUOTA_PROBE_KEY, RATE_LIMIT_KEY_PREFIX, WISHLIST_KEY,
};

pub use validate::{
    clamp_popularity_score, is_valid_item_id, is_valid_item_type, parse_popularity_score,
    sanitize_string, sanitize_value, validate_popularity_score, ItemType,
    DEFAULT_MAX_STRING_LEN, MAX_ITEM_ID_LEN, MAX_POPULARITY_SCORE,
};

pub use wishlist::{
    NewSavedItem, SavedItem, Wishlist, WishlistConfig, DEFAULT_MAX_WISHLIST_ITEMS,
};

use std::sync::Arc;

/// A rate limiter wrapped in `Arc`, shared by a wishlist and its popularity store.
pub type SharedRateLimiter = Arc<RateLimiter>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum supported Rust version.
pub const MSRV: &str = "1.70.0";

/// Prelude module for convenient imports.
///
/// ```rust
/// use wishrank::prelude::*;
/// ```
pub mod prelude {
    //! Common imports for wiring up a wishlist.
    //!
    //! # Example
    //! ```rust
    //! use wishrank::prelude::*;
    //!
    //! let wishlist = WishlistBuilder::new().build();
    //! let item = NewSavedItem::new("retreat-1", "Jungle Retreat", "jungle", ItemType::Retreat);
    //! assert!(wishlist.add_to_wishlist(item));
    //! assert_eq!(wishlist.remaining_actions(), 9);
    //! ```

    pub use crate::{
        Action, CatalogItem, Clock, ItemType, MemoryStorage, NewSavedItem, PopularityStore,
        RateLimitConfig, RateLimiter, Rankable, SavedItem, SharedRateLimiter, Storage,
        SystemClock, Wishlist, WishlistBuilder, WishlistConfig,
    };
}

/// Builder for a [`Wishlist`] and the limiter and popularity store behind it.
///
/// Defaults to a fresh [`MemoryStorage`], the [`SystemClock`], 10 wishlist
/// actions per minute and 50 saved items.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use wishrank::{Action, ManualClock, MemoryStorage, RateLimitConfig, WishlistBuilder};
///
/// let storage = MemoryStorage::new();
/// let wishlist = WishlistBuilder::new()
///     .storage(Arc::new(storage.clone()))
///     .clock(Arc::new(ManualClock::new(0)))
///     .rate_limits(RateLimitConfig::default().with_limit(Action::WishlistActions, 3))
///     .max_items(20)
///     .build();
///
/// assert_eq!(wishlist.remaining_actions(), 3);
///
/// // Or use try_build() for error handling
/// let result = WishlistBuilder::new().max_items(0).try_build();
/// assert!(result.is_err());
/// ```
#[derive(Clone)]
pub struct WishlistBuilder {
    storage: Option<SharedStorage>,
    clock: Option<SharedClock>,
    rate_limits: RateLimitConfig,
    config: WishlistConfig,
}

impl WishlistBuilder {
    /// Creates a builder with default configuration.
    pub fn new() -> Self {
        Self {
            storage: None,
            clock: None,
            rate_limits: RateLimitConfig::default(),
            config: WishlistConfig::default(),
        }
    }

    /// Sets the storage backend. Handles built over clones of one storage
    /// share state.
    pub fn storage(mut self, storage: SharedStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the time source.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the per-action budgets, window and sweep interval.
    pub fn rate_limits(mut self, rate_limits: RateLimitConfig) -> Self {
        self.rate_limits = rate_limits;
        self
    }

    /// Sets the wishlist configuration.
    pub fn config(mut self, config: WishlistConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the wishlist capacity.
    pub fn max_items(mut self, max_items: usize) -> Self {
        self.config.max_items = max_items;
        self
    }

    /// Sets the storage key of the saved set.
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.config.storage_key = key.into();
        self
    }

    /// Builds the wishlist.
    ///
    /// # Panics
    ///
    /// Panics if either configuration is invalid. Use `try_build()` to handle
    /// errors.
    pub fn build(self) -> Wishlist {
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let limiter = Arc::new(RateLimiter::new(
            storage.clone(),
            clock.clone(),
            self.rate_limits,
        ));
        Wishlist::new(storage, clock, limiter, self.config)
    }

    /// Attempts to build the wishlist, returning an error if invalid.
    ///
    /// # Errors
    ///
    /// Returns an error message if either configuration is invalid.
    pub fn try_build(self) -> Result<Wishlist, &'static str> {
        self.rate_limits.validate()?;
        self.config.validate()?;
        Ok(self.build())
    }
}

impl Default for WishlistBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WishlistBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WishlistBuilder")
            .field("custom_storage", &self.storage.is_some())
            .field("custom_clock", &self.clock.is_some())
            .field("rate_limits", &self.rate_limits)
            .field("config", &self.config)
            .finish()
    }
}
