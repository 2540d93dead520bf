//! # Time Sources (utils.rs)
//!
//! Rate-limit windows are wall-clock based: an entry stores the epoch
//! millisecond at which its window ends. The limiter reads time through the
//! [`Clock`] trait so tests can step past a window boundary without sleeping.
//!
//! ```text
//!     Clock implementations:
//!
//!     SystemClock ──► epoch ms anchored once, advanced monotonically
//!     ManualClock ──► fixed value, moved explicitly with set()/advance()
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

// Monotonic time base to prevent issues when the system clock jumps.
// We capture the wall-clock epoch milliseconds at process start,
// then advance using a monotonic Instant to compute 'now'.
static START_TIME_BASE: OnceLock<(Instant, u64)> = OnceLock::new();

/// Returns the current time in milliseconds since UNIX epoch.
///
/// The epoch offset is sampled once per process and then advanced with a
/// monotonic clock, so consecutive calls never go backwards.
///
/// # Example
///
/// ```rust
/// use wishrank::current_time_ms;
///
/// let a = current_time_ms();
/// let b = current_time_ms();
/// assert!(b >= a);
/// ```
#[inline]
pub fn current_time_ms() -> u64 {
    let (start, base_ms) = START_TIME_BASE.get_or_init(|| {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        (Instant::now(), epoch_ms)
    });
    base_ms.saturating_add(start.elapsed().as_millis() as u64)
}

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since UNIX epoch.
    fn now_ms(&self) -> u64;
}

/// A clock shared between the limiter, the popularity store and the wishlist.
pub type SharedClock = Arc<dyn Clock>;

/// The process clock, see [`current_time_ms`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        current_time_ms()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can keep one handle and give
/// another to the component under test.
///
/// # Example
///
/// ```rust
/// use wishrank::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// let handle = clock.clone();
///
/// clock.advance(60_001);
/// assert_eq!(handle.now_ms(), 61_001);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock frozen at `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(now_ms)),
        }
    }

    /// Moves the clock to `now_ms`.
    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::Release);
    }

    /// Moves the clock forward by `delta_ms`.
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Acquire)
    }
}
