//! # Rate Limiter Module
//!
//! Fixed-window admission control per action category, persisted in the
//! shared key-value storage.
//!
//! ## Module Structure
//!
//! ```text
//!     rate_limiter/
//!     ├── mod.rs          (You are here - Module organization)
//!     ├── config.rs       (Action categories, budgets, window length)
//!     ├── core.rs         (Persisted window entry and its transitions)
//!     ├── manager.rs      (Storage-backed limiter and cleanup sweep)
//!     ├── metrics.rs      (Window snapshots and limiter statistics)
//!     └── utils.rs        (Clocks)
//! ```
//!
//! ## Architecture Flow
//!
//! ```text
//!     Wishlist / PopularityStore
//!          │
//!          ▼
//!     ┌─────────┐
//!     │ Manager │ ◄── check, record, sweep
//!     └────┬────┘
//!          │
//!          ▼
//!     ┌─────────┐
//!     │  Core   │ ◄── {count, resetTime} transitions
//!     └────┬────┘
//!          │
//!          ▼
//!     ┌─────────┐
//!     │ Config  │ ◄── limits per action
//!     └─────────┘
//! ```

mod config;
mod core;
mod manager;
mod metrics;
mod utils;

/// Action categories and limiter settings
pub use config::{
    Action, RateLimitConfig, ANONYMOUS_IDENTIFIER, DEFAULT_CLEANUP_INTERVAL_MS,
    DEFAULT_WINDOW_MS,
};

/// Persisted window record
pub use self::core::RateLimitEntry;

/// Storage-backed fixed-window limiter
pub use manager::RateLimiter;

/// Snapshots for display and logging
pub use metrics::{LimiterStats, WindowState, WindowStatus};

/// Time sources
pub use utils::{current_time_ms, Clock, ManualClock, SharedClock, SystemClock};
