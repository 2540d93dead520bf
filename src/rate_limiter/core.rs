//! # Fixed-Window Entry
//!
//! One persisted record per `(action, identifier)`: how many actions were
//! admitted in the current window and the epoch millisecond at which the
//! window ends.
//!
//! ```text
//!     Window lifecycle:
//!
//!     (absent) ──record──► {count: 1, resetTime: now + window}
//!                               │
//!                  record while now <= resetTime
//!                               ▼
//!                      {count: n + 1, resetTime}     count >= limit ⇒ Limited
//!                               │
//!                  record once now > resetTime
//!                               ▼
//!                      {count: 1, resetTime: now + window}
//! ```
//!
//! The boundary is inclusive: at `now == resetTime` the window is still open.

use serde::{Deserialize, Serialize};

/// Persisted state of one rate-limit window.
///
/// Serialized as `{"count": n, "resetTime": ms}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitEntry {
    /// Actions admitted in this window.
    pub count: u32,

    /// Epoch millisecond at which the window ends.
    pub reset_time: u64,
}

impl RateLimitEntry {
    /// Starts a new window containing one action.
    #[inline]
    pub fn first(now_ms: u64, window_ms: u64) -> Self {
        Self {
            count: 1,
            reset_time: now_ms.saturating_add(window_ms),
        }
    }

    /// Returns `true` once the window has ended (`now > resetTime`).
    #[inline]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.reset_time
    }

    /// Returns `true` if the budget for this window is spent.
    #[inline]
    pub fn is_limited(&self, limit: u32) -> bool {
        self.count >= limit
    }

    /// Actions still admissible in this window.
    #[inline]
    pub fn remaining(&self, limit: u32) -> u32 {
        limit.saturating_sub(self.count)
    }

    /// Applies one action at `now_ms`, starting a fresh window if this one ended.
    pub fn record(self, now_ms: u64, window_ms: u64) -> Self {
        if self.is_expired(now_ms) {
            Self::first(now_ms, window_ms)
        } else {
            Self {
                count: self.count.saturating_add(1),
                reset_time: self.reset_time,
            }
        }
    }

    /// Decodes a persisted entry.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Encodes the entry for persistence.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
