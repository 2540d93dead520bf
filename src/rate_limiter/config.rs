//! # Rate Limiter Configuration
//!
//! Action categories and their per-window budgets. The limiter is scoped by
//! action, not by component: the wishlist and the popularity store both draw
//! from the `WISHLIST_ACTIONS` budget.
//!
//! ```text
//!     Action            Limit   Window
//!     ─────────────────────────────────
//!     WISHLIST_ACTIONS    10    60 s
//!     POPULARITY_DEMO     20    60 s
//!
//!     Sweep of expired entries: every 5 min
//! ```

use crate::storage::RATE_LIMIT_KEY_PREFIX;
use std::fmt;

/// Length of one rate-limit window.
pub const DEFAULT_WINDOW_MS: u64 = 60_000;

/// Interval between sweeps of expired rate-limit entries.
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 5 * 60_000;

/// Identifier used when the caller does not distinguish users.
pub const ANONYMOUS_IDENTIFIER: &str = "anonymous";

/// An action category with its own budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Adding or removing saved items (and the popularity changes they cause).
    WishlistActions,

    /// Clicks on the popularity demo panel.
    PopularityDemo,
}

impl Action {
    /// Every action category.
    pub const ALL: [Action; 2] = [Action::WishlistActions, Action::PopularityDemo];

    /// Name used in storage keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WishlistActions => "WISHLIST_ACTIONS",
            Self::PopularityDemo => "POPULARITY_DEMO",
        }
    }

    /// Storage key of the window for `identifier`.
    ///
    /// ```rust
    /// use wishrank::Action;
    ///
    /// assert_eq!(
    ///     Action::WishlistActions.storage_key("anonymous"),
    ///     "rate-limit-WISHLIST_ACTIONS-anonymous"
    /// );
    /// ```
    pub fn storage_key(&self, identifier: &str) -> String {
        format!("{}{}-{}", RATE_LIMIT_KEY_PREFIX, self.as_str(), identifier)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Budgets and timing for the fixed-window limiter.
///
/// ## Examples
///
/// ```rust
/// use wishrank::{Action, RateLimitConfig};
///
/// let config = RateLimitConfig::default();
/// assert_eq!(config.limit(Action::WishlistActions), 10);
/// assert_eq!(config.limit(Action::PopularityDemo), 20);
///
/// // Tighter budget for a kiosk deployment
/// let strict = RateLimitConfig::default().with_limit(Action::WishlistActions, 3);
/// assert_eq!(strict.limit(Action::WishlistActions), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Admissible wishlist actions per window.
    pub wishlist_actions: u32,

    /// Admissible demo clicks per window.
    pub popularity_demo: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// How often the background sweep removes expired entries.
    pub cleanup_interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            wishlist_actions: 10,
            popularity_demo: 20,
            window_ms: DEFAULT_WINDOW_MS,
            cleanup_interval_ms: DEFAULT_CLEANUP_INTERVAL_MS,
        }
    }
}

impl RateLimitConfig {
    /// Budget of `action` per window.
    #[inline]
    pub fn limit(&self, action: Action) -> u32 {
        match action {
            Action::WishlistActions => self.wishlist_actions,
            Action::PopularityDemo => self.popularity_demo,
        }
    }

    /// Sets the budget of one action.
    pub fn with_limit(mut self, action: Action, limit: u32) -> Self {
        match action {
            Action::WishlistActions => self.wishlist_actions = limit,
            Action::PopularityDemo => self.popularity_demo = limit,
        }
        self
    }

    /// Sets the window length.
    pub fn with_window_ms(mut self, window_ms: u64) -> Self {
        self.window_ms = window_ms;
        self
    }

    /// Sets the sweep interval.
    pub fn with_cleanup_interval_ms(mut self, cleanup_interval_ms: u64) -> Self {
        self.cleanup_interval_ms = cleanup_interval_ms;
        self
    }

    /// Checks that the configuration can admit anything at all.
    ///
    /// # Errors
    ///
    /// Returns an error message if any limit, the window or the sweep interval is 0.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.wishlist_actions == 0 {
            return Err("wishlist_actions must be greater than 0");
        }
        if self.popularity_demo == 0 {
            return Err("popularity_demo must be greater than 0");
        }
        if self.window_ms == 0 {
            return Err("window_ms must be greater than 0");
        }
        if self.cleanup_interval_ms == 0 {
            return Err("cleanup_interval_ms must be greater than 0");
        }
        Ok(())
    }
}
