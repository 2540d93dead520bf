//! # Popularity Store
//!
//! Persisted map from item id to the number of times it was saved, kept in
//! `[0, 10000]`. Records appear on first increment and are never deleted, only
//! decremented toward zero.
//!
//! ## Advisory, Best-Effort Counters
//!
//! Every mutation is a read-modify-write of the whole map with no lock, no
//! transaction and no version check. Two handles over the same storage (two
//! open tabs) that interleave like this lose an update:
//!
//! ```text
//!     Tab A: read {x: 4} ─────────────── write {x: 5}
//!     Tab B:        read {x: 4} ─────────────────── write {x: 5}   (6 expected)
//! ```
//!
//! Counts are therefore advisory. Stronger consistency would need a
//! single-writer arbitration channel between handles, which this store does
//! not provide.

use crate::rate_limiter::{Action, RateLimiter};
use crate::ranking::{self, Rankable};
use crate::storage::{secure_get, secure_set, SharedStorage, POPULARITY_SCORES_KEY};
use crate::validate::{clamp_popularity_score, is_valid_item_id, parse_popularity_score};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Item id to save count. Ordered so the persisted JSON is stable.
pub type PopularityScores = BTreeMap<String, u32>;

/// Persisted popularity counters guarded by the `WISHLIST_ACTIONS` budget.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use wishrank::{MemoryStorage, PopularityStore, RateLimitConfig, RateLimiter, SystemClock};
///
/// let storage = Arc::new(MemoryStorage::new());
/// let limiter = Arc::new(RateLimiter::new(
///     storage.clone(),
///     Arc::new(SystemClock),
///     RateLimitConfig::default(),
/// ));
/// let store = PopularityStore::new(storage, limiter);
///
/// assert!(store.increment("studio-1"));
/// assert_eq!(store.item_score("studio-1"), 1);
/// assert!(!store.increment("not valid!"));
/// ```
pub struct PopularityStore {
    storage: SharedStorage,
    limiter: Arc<RateLimiter>,
}

impl PopularityStore {
    /// Creates a store over `storage`, gated by `limiter`.
    pub fn new(storage: SharedStorage, limiter: Arc<RateLimiter>) -> Self {
        Self { storage, limiter }
    }

    /// The limiter shared with the wishlist.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Loads the persisted map, keeping only well-formed records.
    ///
    /// Keys that are not valid item ids and values that are not non-negative
    /// integers are dropped from the result. A missing, unreadable or non-JSON
    /// blob yields an empty map.
    pub fn scores(&self) -> PopularityScores {
        let Some(raw) = secure_get(self.storage.as_ref(), POPULARITY_SCORES_KEY) else {
            return PopularityScores::new();
        };

        let parsed: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                error!("Error loading popularity scores: {}", e);
                return PopularityScores::new();
            }
        };

        let Value::Object(entries) = parsed else {
            warn!("Popularity scores blob is not an object, ignoring it");
            return PopularityScores::new();
        };

        let total = entries.len();
        let scores: PopularityScores = entries
            .iter()
            .filter(|(id, _)| is_valid_item_id(id))
            .filter_map(|(id, value)| parse_popularity_score(value).map(|n| (id.clone(), n)))
            .collect();

        if scores.len() < total {
            debug!(
                "Dropped {} malformed popularity records",
                total - scores.len()
            );
        }
        scores
    }

    /// Persists `scores` after re-validating every record.
    ///
    /// Invalid ids are dropped and counts are capped. Returns `false` if the
    /// write fails.
    pub fn save_scores(&self, scores: &PopularityScores) -> bool {
        let sanitized: PopularityScores = scores
            .iter()
            .filter(|(id, _)| is_valid_item_id(id))
            .map(|(id, count)| (id.clone(), clamp_popularity_score(*count)))
            .collect();

        match serde_json::to_string(&sanitized) {
            Ok(json) => secure_set(self.storage.as_ref(), POPULARITY_SCORES_KEY, &json),
            Err(e) => {
                error!("Error saving popularity scores: {}", e);
                false
            }
        }
    }

    /// Counts one more save of `id`.
    ///
    /// Returns `false` without touching storage if `id` is invalid or the
    /// `WISHLIST_ACTIONS` budget is spent. Otherwise records the action and
    /// writes `count + 1` (capped at 10000), returning the write result.
    pub fn increment(&self, id: &str) -> bool {
        if !self.admit(id, "increment") {
            return false;
        }

        let mut scores = self.scores();
        let count = scores.entry(id.to_string()).or_insert(0);
        *count = clamp_popularity_score(count.saturating_add(1));
        self.save_scores(&scores)
    }

    /// Counts one fewer save of `id`, never going below zero.
    ///
    /// Same guards as [`increment`](Self::increment). Decrementing an id with
    /// no record leaves the map unchanged.
    pub fn decrement(&self, id: &str) -> bool {
        if !self.admit(id, "decrement") {
            return false;
        }

        let mut scores = self.scores();
        if let Some(count) = scores.get_mut(id) {
            *count = count.saturating_sub(1);
        }
        self.save_scores(&scores)
    }

    /// Current count of `id`; `0` if absent or `id` is invalid.
    pub fn item_score(&self, id: &str) -> u32 {
        if !is_valid_item_id(id) {
            return 0;
        }
        self.scores().get(id).copied().unwrap_or(0)
    }

    /// Demo-panel save: spends one `POPULARITY_DEMO` action, then increments.
    ///
    /// The increment still applies its own `WISHLIST_ACTIONS` gate, so a demo
    /// click can be admitted by the demo budget and still rejected.
    pub fn record_demo_save(&self, id: &str) -> bool {
        if self.limiter.is_rate_limited(Action::PopularityDemo) {
            warn!("Rate limit exceeded for demo actions");
            return false;
        }

        self.limiter.record_action(Action::PopularityDemo);
        self.increment(id)
    }

    /// Orders `items` by rating plus popularity boost; see
    /// [`ranking::sort_by_popularity_and_rating`].
    pub fn sort_by_popularity_and_rating<T: Rankable + Clone>(&self, items: &[T]) -> Vec<T> {
        ranking::sort_by_popularity_and_rating(items, &self.scores())
    }

    /// Orders `items` by popularity alone; see [`ranking::sort_by_popularity`].
    pub fn sort_by_popularity<T: Rankable + Clone>(&self, items: &[T]) -> Vec<T> {
        ranking::sort_by_popularity(items, &self.scores())
    }

    /// Shared guard of increment and decrement. Records the action when admitted.
    fn admit(&self, id: &str, op: &str) -> bool {
        if !is_valid_item_id(id) {
            warn!("Invalid item ID for popularity {}: {:?}", op, id);
            return false;
        }

        if self.limiter.is_rate_limited(Action::WishlistActions) {
            warn!("Rate limit exceeded for wishlist actions");
            return false;
        }

        self.limiter.record_action(Action::WishlistActions);
        true
    }
}

impl std::fmt::Debug for PopularityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopularityStore")
            .field("limiter", &self.limiter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::{ManualClock, RateLimitConfig};
    use crate::storage::{MemoryStorage, Storage};
    use crate::validate::MAX_POPULARITY_SCORE;

    fn store_with(storage: &MemoryStorage, clock: &ManualClock) -> PopularityStore {
        let shared: SharedStorage = Arc::new(storage.clone());
        let limiter = Arc::new(RateLimiter::new(
            shared.clone(),
            Arc::new(clock.clone()),
            RateLimitConfig::default(),
        ));
        PopularityStore::new(shared, limiter)
    }

    fn fresh() -> (PopularityStore, MemoryStorage, ManualClock) {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(1_000);
        (store_with(&storage, &clock), storage, clock)
    }

    #[test]
    fn test_increment_creates_record_lazily() {
        let (store, storage, _) = fresh();

        assert!(store.scores().is_empty());
        assert!(store.increment("studio-1"));
        assert!(store.increment("studio-1"));

        assert_eq!(store.item_score("studio-1"), 2);
        assert_eq!(
            storage.get(POPULARITY_SCORES_KEY).unwrap().as_deref(),
            Some(r#"{"studio-1":2}"#)
        );
    }

    #[test]
    fn test_round_trip_restores_score() {
        let (store, _, _) = fresh();

        store.increment("retreat-9");
        let before = store.item_score("retreat-9");

        assert!(store.increment("retreat-9"));
        assert!(store.decrement("retreat-9"));
        assert_eq!(store.item_score("retreat-9"), before);
    }

    #[test]
    fn test_decrement_floors_at_zero() {
        let (store, _, _) = fresh();

        assert!(store.increment("a"));
        assert!(store.decrement("a"));
        assert!(store.decrement("a"));
        assert_eq!(store.item_score("a"), 0);

        // No record is created for an unknown id
        assert!(store.decrement("never-saved"));
        assert!(!store.scores().contains_key("never-saved"));
    }

    #[test]
    fn test_increment_caps_at_max() {
        let (store, storage, _) = fresh();
        storage
            .set(POPULARITY_SCORES_KEY, r#"{"hot":10000}"#)
            .unwrap();

        assert!(store.increment("hot"));
        assert_eq!(store.item_score("hot"), MAX_POPULARITY_SCORE);
    }

    #[test]
    fn test_invalid_id_rejected_without_spending_budget() {
        let (store, storage, _) = fresh();

        assert!(!store.increment("bad id!"));
        assert!(!store.decrement(""));
        assert_eq!(store.item_score("bad id!"), 0);

        assert!(storage.is_empty());
        assert_eq!(store.limiter().remaining_actions(Action::WishlistActions), 10);
    }

    #[test]
    fn test_rate_limited_increment_leaves_state_unchanged() {
        let (store, storage, _) = fresh();

        for _ in 0..10 {
            assert!(store.increment("x"));
        }
        let snapshot = storage.get(POPULARITY_SCORES_KEY).unwrap();

        assert!(!store.increment("x"));
        assert!(!store.decrement("x"));
        assert_eq!(storage.get(POPULARITY_SCORES_KEY).unwrap(), snapshot);
        assert_eq!(store.item_score("x"), 10);
        // The rejected calls did not record anything
        assert_eq!(store.limiter().stats().total_recorded, 10);
    }

    #[test]
    fn test_corrupt_blob_yields_empty_map() {
        let (store, storage, _) = fresh();

        storage.set(POPULARITY_SCORES_KEY, "{{not json").unwrap();
        assert!(store.scores().is_empty());

        storage.set(POPULARITY_SCORES_KEY, "[1, 2, 3]").unwrap();
        assert!(store.scores().is_empty());
    }

    #[test]
    fn test_partially_invalid_blob_keeps_well_formed_subset() {
        let (store, storage, _) = fresh();
        storage
            .set(
                POPULARITY_SCORES_KEY,
                r#"{"good-1": 3, "bad id": 4, "neg": -2, "frac": 1.5, "str": "7", "big": 99999, "float-int": 2.0}"#,
            )
            .unwrap();

        let scores = store.scores();
        let expected: PopularityScores = [
            ("big".to_string(), 10_000),
            ("float-int".to_string(), 2),
            ("good-1".to_string(), 3),
        ]
        .into_iter()
        .collect();
        assert_eq!(scores, expected);
    }

    #[test]
    fn test_save_revalidates() {
        let (store, storage, _) = fresh();

        let mut scores = PopularityScores::new();
        scores.insert("ok".to_string(), 20_000);
        scores.insert("not ok".to_string(), 1);

        assert!(store.save_scores(&scores));
        assert_eq!(
            storage.get(POPULARITY_SCORES_KEY).unwrap().as_deref(),
            Some(r#"{"ok":10000}"#)
        );
    }

    #[test]
    fn test_save_reports_quota_failure() {
        let storage = MemoryStorage::with_quota(64);
        let clock = ManualClock::new(0);
        let store = store_with(&storage, &clock);

        // The quota probe alone does not fit
        assert!(!store.increment("studio-1"));
        assert_eq!(store.item_score("studio-1"), 0);
    }

    #[test]
    fn test_demo_save_uses_both_budgets() {
        let (store, _, _) = fresh();

        assert!(store.record_demo_save("demo-studio-1"));
        assert_eq!(store.item_score("demo-studio-1"), 1);

        let limiter = store.limiter();
        assert_eq!(limiter.remaining_actions(Action::PopularityDemo), 19);
        assert_eq!(limiter.remaining_actions(Action::WishlistActions), 9);

        // Exhaust the wishlist budget: demo clicks are admitted but rejected downstream
        for _ in 0..9 {
            store.increment("demo-studio-2");
        }
        assert!(!store.record_demo_save("demo-studio-1"));
        assert_eq!(limiter.remaining_actions(Action::PopularityDemo), 18);
        assert_eq!(store.item_score("demo-studio-1"), 1);
    }

    #[test]
    fn test_window_reset_readmits() {
        let (store, _, clock) = fresh();

        for _ in 0..10 {
            store.increment("x");
        }
        assert!(!store.increment("x"));

        clock.advance(60_001);
        assert!(store.increment("x"));
        assert_eq!(store.item_score("x"), 11);
    }

    #[test]
    fn test_interleaved_handles_lose_an_update() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(0);
        let tab_a = store_with(&storage, &clock);
        let tab_b = store_with(&storage, &clock);
        tab_a.increment("shared");

        let mut seen_by_a = tab_a.scores();
        let mut seen_by_b = tab_b.scores();
        *seen_by_a.get_mut("shared").unwrap() += 1;
        *seen_by_b.get_mut("shared").unwrap() += 1;
        tab_a.save_scores(&seen_by_a);
        tab_b.save_scores(&seen_by_b);

        // Two increments on top of 1, but only one survives
        assert_eq!(tab_a.item_score("shared"), 2);
    }
}
