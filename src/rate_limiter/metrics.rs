//! # Window Status and Limiter Statistics
//!
//! Read-only snapshots for UI display and logging: where one
//! `(action, identifier)` window stands, and lifetime counters of a limiter.
//!
//! ```text
//!     WISHLIST_ACTIONS/anonymous
//!     ├─ State: Limited
//!     ├─ Used: 10/10
//!     └─ Resets at: 1700000060000
//! ```

use super::config::Action;
use std::fmt;

/// The two states of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// Below the limit, or no live window.
    Open,

    /// At or above the limit within the current window.
    Limited,
}

/// Snapshot of one rate-limit window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowStatus {
    /// Action category.
    pub action: Action,

    /// Identifier the window belongs to.
    pub identifier: String,

    /// Actions admitted in the live window (0 if none).
    pub count: u32,

    /// Budget of the action.
    pub limit: u32,

    /// Epoch millisecond at which the live window ends, if one exists.
    pub reset_time_ms: Option<u64>,
}

impl WindowStatus {
    /// Actions still admissible.
    #[inline]
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.count)
    }

    /// Open or Limited.
    #[inline]
    pub fn state(&self) -> WindowState {
        if self.count >= self.limit {
            WindowState::Limited
        } else {
            WindowState::Open
        }
    }

    /// Milliseconds until the window resets, `0` when there is no live window.
    pub fn retry_after_ms(&self, now_ms: u64) -> u64 {
        self.reset_time_ms
            .map(|reset| reset.saturating_sub(now_ms))
            .unwrap_or(0)
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let reset = match self.reset_time_ms {
            Some(ms) => ms.to_string(),
            None => "-".to_string(),
        };
        format!(
            "{}/{}\n\
             ├─ State: {:?}\n\
             ├─ Used: {}/{}\n\
             └─ Resets at: {}",
            self.action,
            self.identifier,
            self.state(),
            self.count,
            self.limit,
            reset
        )
    }
}

impl fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Lifetime counters of one limiter handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimiterStats {
    /// Actions recorded.
    pub total_recorded: u64,

    /// Checks that found the window Limited.
    pub total_limited: u64,

    /// Expired entries removed by sweeps.
    pub total_cleaned: u64,

    /// Read, parse or write failures that were absorbed (fail-open).
    pub storage_errors: u64,
}

impl LimiterStats {
    /// Limited checks as a share of limited checks plus recorded actions; `0.0` when idle.
    pub fn rejection_ratio(&self) -> f64 {
        let total = self.total_recorded + self.total_limited;
        if total == 0 {
            0.0
        } else {
            self.total_limited as f64 / total as f64
        }
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Rate Limiter Stats:\n\
             ├─ Recorded: {}\n\
             ├─ Limited: {}\n\
             ├─ Cleaned: {}\n\
             └─ Storage Errors: {}",
            self.total_recorded, self.total_limited, self.total_cleaned, self.storage_errors
        )
    }
}

impl fmt::Display for LimiterStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}
