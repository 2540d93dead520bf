//! # Wishlist
//!
//! The saved-item set a visitor builds while browsing, and the only surface
//! the application talks to. Every mutation goes through the shared
//! `WISHLIST_ACTIONS` budget and moves the item's popularity counter in step.
//!
//! ```text
//!     add_to_wishlist(item)
//!         │
//!         ├─ invalid id ───────────────► false
//!         ├─ rate limited ─────────────► false
//!         ├─ already saved ────────────► true   (no second increment)
//!         ├─ already holds 50 ─────────► false
//!         ├─ increment popularity ✗ ───► false  (set unchanged)
//!         ├─ prepend, persist
//!         └─ persist ✗ ────────────────► false  (increment taken back)
//!
//!     remove_from_wishlist(id)
//!         ├─ not saved ────────────────► false
//!         ├─ decrement popularity ✗ ───► false  (set unchanged)
//!         └─ drop, persist
//! ```
//!
//! The set is persisted under `bali-yoga-wishlist` as a JSON array, most
//! recent first, and re-read on every call so handles sharing a storage see
//! each other's writes.

use crate::popularity::PopularityStore;
use crate::rate_limiter::{Action, RateLimiter, SharedClock};
use crate::ranking::Rankable;
use crate::storage::{secure_get, secure_set, SharedStorage, WISHLIST_KEY};
use crate::validate::{
    is_valid_item_id, sanitize_string, sanitize_value, ItemType, DEFAULT_MAX_STRING_LEN,
};
use ahash::AHashSet;
use chrono::{SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Default capacity of the saved set.
pub const DEFAULT_MAX_WISHLIST_ITEMS: usize = 50;

const MAX_NAME_LEN: usize = 200;
const MAX_SHORT_TEXT_LEN: usize = 50;
const MAX_URL_LEN: usize = 500;
const MAX_PHONE_LEN: usize = 30;
const MAX_STYLES: usize = 20;

/// A saved catalog item as persisted in the wishlist blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedItem {
    /// Catalog id; unique within the set.
    pub id: String,

    /// Display name.
    pub name: String,

    /// URL slug of the detail page.
    pub slug: String,

    /// Thumbnail URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Area or town.
    #[serde(default)]
    pub location: String,

    /// Quality rating in `0.0..=5.0`.
    #[serde(default)]
    pub rating: f64,

    /// Studio or retreat.
    #[serde(rename = "type")]
    pub item_type: ItemType,

    /// Yoga styles offered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<Vec<String>>,

    /// Retreat length, free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    /// Price, free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,

    /// Contact number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    /// Website URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    /// ISO-8601 UTC timestamp of when the item was saved.
    #[serde(rename = "addedAt", default)]
    pub added_at: String,
}

impl SavedItem {
    /// Applies the string sanitizer and length caps to every text field and
    /// clamps the rating.
    pub fn sanitized(self) -> Self {
        Self {
            id: self.id,
            name: sanitize_string(&self.name, MAX_NAME_LEN),
            slug: sanitize_string(&self.slug, DEFAULT_MAX_STRING_LEN),
            image: sanitize_optional(self.image, MAX_URL_LEN),
            location: sanitize_string(&self.location, DEFAULT_MAX_STRING_LEN),
            rating: clamp_rating(self.rating),
            item_type: self.item_type,
            styles: self.styles.map(|styles| {
                styles
                    .iter()
                    .map(|s| sanitize_string(s, MAX_SHORT_TEXT_LEN))
                    .filter(|s| !s.is_empty())
                    .take(MAX_STYLES)
                    .collect()
            }),
            duration: sanitize_optional(self.duration, MAX_SHORT_TEXT_LEN),
            price: sanitize_optional(self.price, MAX_SHORT_TEXT_LEN),
            phone_number: sanitize_optional(self.phone_number, MAX_PHONE_LEN),
            website: sanitize_optional(self.website, MAX_URL_LEN),
            added_at: sanitize_string(&self.added_at, MAX_SHORT_TEXT_LEN),
        }
    }

    /// Rebuilds a persisted record from untyped JSON.
    ///
    /// The record must be an object with string `id`, `name` and `slug`, a
    /// valid id and a known `type`. Every other field is coerced: text fields
    /// that are missing or not strings become empty, a rating that is not a
    /// number becomes 0.
    pub fn from_value(record: &Value) -> Option<Self> {
        let id = record.get("id")?.as_str()?;
        let name = record.get("name")?.as_str()?;
        let slug = record.get("slug")?.as_str()?;
        if !is_valid_item_id(id) {
            return None;
        }
        let item_type = record.get("type")?.as_str()?.parse::<ItemType>().ok()?;

        let text = |field: &str, max_len: usize| {
            record
                .get(field)
                .map(|value| sanitize_value(value, max_len))
                .unwrap_or_default()
        };
        let optional_text =
            |field: &str, max_len: usize| Some(text(field, max_len)).filter(|v| !v.is_empty());

        let styles = record.get("styles").and_then(Value::as_array).map(|styles| {
            styles
                .iter()
                .filter_map(Value::as_str)
                .map(|s| sanitize_string(s, MAX_SHORT_TEXT_LEN))
                .filter(|s| !s.is_empty())
                .take(MAX_STYLES)
                .collect()
        });

        Some(Self {
            id: id.to_string(),
            name: sanitize_string(name, MAX_NAME_LEN),
            slug: sanitize_string(slug, DEFAULT_MAX_STRING_LEN),
            image: optional_text("image", MAX_URL_LEN),
            location: text("location", DEFAULT_MAX_STRING_LEN),
            rating: clamp_rating(
                record
                    .get("rating")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
            ),
            item_type,
            styles,
            duration: optional_text("duration", MAX_SHORT_TEXT_LEN),
            price: optional_text("price", MAX_SHORT_TEXT_LEN),
            phone_number: optional_text("phone_number", MAX_PHONE_LEN),
            website: optional_text("website", MAX_URL_LEN),
            added_at: text("addedAt", MAX_SHORT_TEXT_LEN),
        })
    }
}

impl Rankable for SavedItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn rating(&self) -> f64 {
        self.rating
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// An item as handed to [`Wishlist::add_to_wishlist`]; the timestamp is
/// assigned on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSavedItem {
    /// Catalog id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
    /// Thumbnail URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Area or town.
    #[serde(default)]
    pub location: String,
    /// Quality rating.
    #[serde(default)]
    pub rating: f64,
    /// Studio or retreat.
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Yoga styles offered.
    #[serde(default)]
    pub styles: Option<Vec<String>>,
    /// Retreat length.
    #[serde(default)]
    pub duration: Option<String>,
    /// Price.
    #[serde(default)]
    pub price: Option<String>,
    /// Contact number.
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Website URL.
    #[serde(default)]
    pub website: Option<String>,
}

impl NewSavedItem {
    /// An item with the required fields set and everything else empty.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        slug: impl Into<String>,
        item_type: ItemType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            slug: slug.into(),
            image: None,
            location: String::new(),
            rating: 0.0,
            item_type,
            styles: None,
            duration: None,
            price: None,
            phone_number: None,
            website: None,
        }
    }

    /// Sets the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Sets the rating.
    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = rating;
        self
    }

    /// Sets the thumbnail URL.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Sets the styles.
    pub fn with_styles<I, S>(mut self, styles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.styles = Some(styles.into_iter().map(Into::into).collect());
        self
    }

    /// Stamps the item with `added_at`.
    pub fn into_saved(self, added_at: String) -> SavedItem {
        SavedItem {
            id: self.id,
            name: self.name,
            slug: self.slug,
            image: self.image,
            location: self.location,
            rating: self.rating,
            item_type: self.item_type,
            styles: self.styles,
            duration: self.duration,
            price: self.price,
            phone_number: self.phone_number,
            website: self.website,
            added_at,
        }
    }
}

/// Where and how many items are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WishlistConfig {
    /// Storage key of the persisted set.
    pub storage_key: String,

    /// Capacity; saving a new item into a full set is refused.
    pub max_items: usize,
}

impl Default for WishlistConfig {
    fn default() -> Self {
        Self {
            storage_key: WISHLIST_KEY.to_string(),
            max_items: DEFAULT_MAX_WISHLIST_ITEMS,
        }
    }
}

impl WishlistConfig {
    /// Sets the storage key.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Sets the capacity.
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Checks the configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.storage_key.is_empty() {
            return Err("storage_key must not be empty");
        }
        if self.max_items == 0 {
            return Err("max_items must be greater than 0");
        }
        Ok(())
    }
}

/// Saved-item set with popularity accounting and rate limiting.
///
/// Use [`WishlistBuilder`](crate::WishlistBuilder) to assemble one.
///
/// # Example
///
/// ```rust
/// use wishrank::{ItemType, NewSavedItem, WishlistBuilder};
///
/// let wishlist = WishlistBuilder::new().build();
/// let item = NewSavedItem::new("studio-7", "Radiantly Alive", "radiantly-alive", ItemType::Studio);
///
/// assert!(wishlist.add_to_wishlist(item));
/// assert!(wishlist.is_in_wishlist("studio-7"));
/// assert_eq!(wishlist.popularity().item_score("studio-7"), 1);
///
/// assert!(wishlist.remove_from_wishlist("studio-7"));
/// assert_eq!(wishlist.wishlist_count(), 0);
/// ```
pub struct Wishlist {
    storage: SharedStorage,
    clock: SharedClock,
    limiter: Arc<RateLimiter>,
    popularity: PopularityStore,
    config: WishlistConfig,
}

impl Wishlist {
    /// Creates a wishlist over `storage`. `limiter` should be the one the
    /// popularity store uses so both spend one budget.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn new(
        storage: SharedStorage,
        clock: SharedClock,
        limiter: Arc<RateLimiter>,
        config: WishlistConfig,
    ) -> Self {
        config.validate().expect("Invalid wishlist configuration");

        let popularity = PopularityStore::new(storage.clone(), limiter.clone());
        Self {
            storage,
            clock,
            limiter,
            popularity,
            config,
        }
    }

    /// Saves `item`, counting one popularity point for it.
    ///
    /// Returns `true` if the item is saved after the call, including when it
    /// already was (nothing is counted twice). Returns `false` for an invalid
    /// id, when the `WISHLIST_ACTIONS` budget is spent, when the set is at
    /// capacity, or when the popularity update or the write fails. A failed
    /// write takes the popularity point back if the limiter still admits the
    /// decrement.
    pub fn add_to_wishlist(&self, item: NewSavedItem) -> bool {
        if !is_valid_item_id(&item.id) {
            warn!("Invalid item ID for wishlist add: {:?}", item.id);
            return false;
        }

        if self.limiter.is_rate_limited(Action::WishlistActions) {
            warn!("Rate limit exceeded for wishlist actions");
            return false;
        }

        let mut items = self.load();
        if items.iter().any(|saved| saved.id == item.id) {
            debug!("{} is already in the wishlist", item.id);
            return true;
        }

        if items.len() >= self.config.max_items {
            warn!(
                "Wishlist holds {} items, not saving {}",
                items.len(),
                item.id
            );
            return false;
        }

        let saved = item.into_saved(self.timestamp()).sanitized();
        let id = saved.id.clone();

        if !self.popularity.increment(&id) {
            warn!("Popularity update failed, not saving {}", id);
            return false;
        }

        items.insert(0, saved);
        if self.persist(&items) {
            return true;
        }

        error!("Wishlist write failed after counting {}, taking it back", id);
        if !self.popularity.decrement(&id) {
            warn!("Could not take back the popularity point for {}", id);
        }
        false
    }

    /// Removes `id`, taking back its popularity point.
    ///
    /// Returns `false` if `id` is invalid or not saved, or if the popularity
    /// update (which applies the rate limit) or the write fails. The set is
    /// unchanged whenever the popularity update fails.
    pub fn remove_from_wishlist(&self, id: &str) -> bool {
        if !is_valid_item_id(id) {
            warn!("Invalid item ID for wishlist remove: {:?}", id);
            return false;
        }

        let mut items = self.load();
        if !items.iter().any(|saved| saved.id == id) {
            debug!("{} is not in the wishlist", id);
            return false;
        }

        if !self.popularity.decrement(id) {
            warn!("Popularity update failed, keeping {}", id);
            return false;
        }

        items.retain(|saved| saved.id != id);
        self.persist(&items)
    }

    /// Whether `id` is saved. Invalid ids are never saved.
    pub fn is_in_wishlist(&self, id: &str) -> bool {
        is_valid_item_id(id) && self.load().iter().any(|saved| saved.id == id)
    }

    /// Empties the set.
    ///
    /// Takes back one popularity point per saved item on a best-effort basis:
    /// decrements refused by the rate limit are skipped and logged. The set is
    /// emptied regardless.
    pub fn clear_wishlist(&self) {
        let items = self.load();

        let skipped = items
            .iter()
            .filter(|saved| !self.popularity.decrement(&saved.id))
            .count();
        if skipped > 0 {
            warn!(
                "Cleared wishlist without decrementing {} of {} items",
                skipped,
                items.len()
            );
        }

        if let Err(e) = self.storage.remove(&self.config.storage_key) {
            error!("Failed to clear wishlist: {}", e);
        }
    }

    /// Saved items, most recent first.
    pub fn wishlist_items(&self) -> Vec<SavedItem> {
        self.load()
    }

    /// Number of saved items.
    pub fn wishlist_count(&self) -> usize {
        self.load().len()
    }

    /// Orders `items` by rating plus popularity boost.
    pub fn sort_by_popularity_and_rating<T: Rankable + Clone>(&self, items: &[T]) -> Vec<T> {
        self.popularity.sort_by_popularity_and_rating(items)
    }

    /// Wishlist actions left in the current window.
    pub fn remaining_actions(&self) -> u32 {
        self.limiter.remaining_actions(Action::WishlistActions)
    }

    /// Whether the wishlist budget is spent for the current window.
    pub fn is_rate_limited(&self) -> bool {
        self.limiter.is_rate_limited(Action::WishlistActions)
    }

    /// The popularity store this wishlist updates.
    pub fn popularity(&self) -> &PopularityStore {
        &self.popularity
    }

    /// The shared limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The active configuration.
    pub fn config(&self) -> &WishlistConfig {
        &self.config
    }

    /// Reads the persisted set, keeping well-formed, unique records up to capacity.
    fn load(&self) -> Vec<SavedItem> {
        let Some(raw) = secure_get(self.storage.as_ref(), &self.config.storage_key) else {
            return Vec::new();
        };

        let parsed: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to load wishlist: {}", e);
                return Vec::new();
            }
        };

        let Value::Array(records) = parsed else {
            warn!("Wishlist blob is not an array, ignoring it");
            return Vec::new();
        };

        let total = records.len();
        let mut seen = AHashSet::with_capacity(total);
        let items: Vec<SavedItem> = records
            .into_iter()
            .filter_map(|record| SavedItem::from_value(&record))
            .filter(|item| seen.insert(item.id.clone()))
            .take(self.config.max_items)
            .collect();

        if items.len() < total {
            debug!("Dropped {} wishlist records on load", total - items.len());
        }
        items
    }

    fn persist(&self, items: &[SavedItem]) -> bool {
        match serde_json::to_string(items) {
            Ok(json) => secure_set(self.storage.as_ref(), &self.config.storage_key, &json),
            Err(e) => {
                error!("Failed to save wishlist: {}", e);
                false
            }
        }
    }

    /// `addedAt` for an item saved now.
    fn timestamp(&self) -> String {
        let now = i64::try_from(self.clock.now_ms()).unwrap_or(i64::MAX);
        match Utc.timestamp_millis_opt(now).single() {
            Some(at) => at.to_rfc3339_opts(SecondsFormat::Millis, true),
            None => {
                warn!("Clock value {} is out of range for a timestamp", now);
                String::new()
            }
        }
    }
}

impl std::fmt::Debug for Wishlist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wishlist")
            .field("config", &self.config)
            .field("limiter", &self.limiter)
            .finish()
    }
}

fn sanitize_optional(value: Option<String>, max_len: usize) -> Option<String> {
    value
        .map(|v| sanitize_string(&v, max_len))
        .filter(|v| !v.is_empty())
}

fn clamp_rating(rating: f64) -> f64 {
    if rating.is_finite() {
        rating.clamp(0.0, 5.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::rate_limiter::{ManualClock, RateLimitConfig};
    use crate::storage::{MemoryStorage, Storage, POPULARITY_SCORES_KEY};

    fn wishlist_with(
        storage: &MemoryStorage,
        clock: &ManualClock,
        config: WishlistConfig,
    ) -> Wishlist {
        let shared: SharedStorage = Arc::new(storage.clone());
        let clock: SharedClock = Arc::new(clock.clone());
        let limiter = Arc::new(RateLimiter::new(
            shared.clone(),
            clock.clone(),
            RateLimitConfig::default(),
        ));
        Wishlist::new(shared, clock, limiter, config)
    }

    fn fresh() -> (Wishlist, MemoryStorage, ManualClock) {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(1_700_000_000_000);
        let wishlist = wishlist_with(&storage, &clock, WishlistConfig::default());
        (wishlist, storage, clock)
    }

    fn studio(id: &str) -> NewSavedItem {
        NewSavedItem::new(id, format!("Studio {}", id), id, ItemType::Studio)
            .with_location("Ubud")
            .with_rating(4.5)
    }

    #[test]
    fn test_add_persists_item_and_counts_popularity() {
        let (wishlist, storage, _) = fresh();

        assert!(wishlist.add_to_wishlist(studio("studio-1")));

        let items = wishlist.wishlist_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "studio-1");
        assert_eq!(items[0].added_at, "2023-11-14T22:13:20.000Z");
        assert_eq!(wishlist.popularity().item_score("studio-1"), 1);

        let raw = storage.get(WISHLIST_KEY).unwrap().unwrap();
        assert!(raw.contains(r#""type":"studio""#));
        assert!(raw.contains(r#""addedAt":"2023-11-14T22:13:20.000Z""#));
    }

    #[test]
    fn test_add_is_idempotent() {
        let (wishlist, _, _) = fresh();

        assert!(wishlist.add_to_wishlist(studio("x")));
        assert!(wishlist.add_to_wishlist(studio("x")));

        assert_eq!(wishlist.wishlist_count(), 1);
        assert_eq!(wishlist.popularity().item_score("x"), 1);
    }

    #[test]
    fn test_invalid_id_is_rejected() {
        let (wishlist, storage, _) = fresh();

        assert!(!wishlist.add_to_wishlist(studio("bad id!")));
        assert!(!wishlist.is_in_wishlist("bad id!"));
        assert!(!wishlist.remove_from_wishlist("bad id!"));

        assert!(storage.get(WISHLIST_KEY).unwrap().is_none());
        assert!(storage.get(POPULARITY_SCORES_KEY).unwrap().is_none());
        assert_eq!(wishlist.remaining_actions(), 10);
    }

    #[test]
    fn test_eleventh_add_is_rejected_until_reset() {
        let (wishlist, _, clock) = fresh();

        for i in 0..10 {
            assert!(wishlist.add_to_wishlist(studio(&format!("s{}", i))));
        }
        assert!(wishlist.is_rate_limited());
        assert_eq!(wishlist.remaining_actions(), 0);

        assert!(!wishlist.add_to_wishlist(studio("s10")));
        assert!(!wishlist.is_in_wishlist("s10"));
        assert_eq!(wishlist.popularity().item_score("s10"), 0);

        clock.advance(60_001);
        assert!(wishlist.add_to_wishlist(studio("s11")));
        assert_eq!(wishlist.wishlist_count(), 11);
    }

    #[test]
    fn test_remove_takes_back_popularity() {
        let (wishlist, _, _) = fresh();

        assert!(wishlist.add_to_wishlist(studio("a")));
        assert!(!wishlist.remove_from_wishlist("never-saved"));
        assert!(wishlist.remove_from_wishlist("a"));

        assert!(!wishlist.is_in_wishlist("a"));
        assert_eq!(wishlist.popularity().item_score("a"), 0);
    }

    #[test]
    fn test_rate_limited_remove_keeps_item() {
        let (wishlist, _, _) = fresh();

        assert!(wishlist.add_to_wishlist(studio("keep")));
        for i in 0..9 {
            wishlist.popularity().increment(&format!("other-{}", i));
        }

        assert!(!wishlist.remove_from_wishlist("keep"));
        assert!(wishlist.is_in_wishlist("keep"));
        assert_eq!(wishlist.popularity().item_score("keep"), 1);
    }

    #[test]
    fn test_full_wishlist_rejects_new_items() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(0);
        let config = WishlistConfig::default().with_max_items(1);
        let wishlist = wishlist_with(&storage, &clock, config);

        assert!(wishlist.add_to_wishlist(studio("a")));
        assert!(!wishlist.add_to_wishlist(studio("b")));
        // Already saved items still report success
        assert!(wishlist.add_to_wishlist(studio("a")));

        let ids: Vec<String> = wishlist.wishlist_items().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["a"]);
        assert_eq!(wishlist.popularity().item_score("a"), 1);
        assert_eq!(wishlist.popularity().item_score("b"), 0);

        // Freeing a slot admits the next item
        assert!(wishlist.remove_from_wishlist("a"));
        assert!(wishlist.add_to_wishlist(studio("b")));
        assert_eq!(wishlist.popularity().item_score("b"), 1);
    }

    #[test]
    fn test_load_truncates_to_capacity() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(0);
        let config = WishlistConfig::default().with_max_items(2);
        let wishlist = wishlist_with(&storage, &clock, config);
        storage
            .set(
                WISHLIST_KEY,
                r#"[
                    {"id":"x","name":"X","slug":"x","type":"studio"},
                    {"id":"y","name":"Y","slug":"y","type":"studio"},
                    {"id":"z","name":"Z","slug":"z","type":"studio"}
                ]"#,
            )
            .unwrap();

        assert_eq!(wishlist.wishlist_count(), 2);
        assert!(!wishlist.is_in_wishlist("z"));
    }

    /// Refuses writes to the wishlist key and stores everything else.
    struct WishlistWriteFails(MemoryStorage);

    impl Storage for WishlistWriteFails {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == WISHLIST_KEY {
                return Err(StorageError::Unavailable("read-only".to_string()));
            }
            self.0.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.0.remove(key)
        }

        fn keys(&self) -> Result<Vec<String>, StorageError> {
            self.0.keys()
        }
    }

    #[test]
    fn test_failed_write_takes_back_popularity() {
        let inner = MemoryStorage::new();
        let shared: SharedStorage = Arc::new(WishlistWriteFails(inner.clone()));
        let clock: SharedClock = Arc::new(ManualClock::new(0));
        let limiter = Arc::new(RateLimiter::new(
            shared.clone(),
            clock.clone(),
            RateLimitConfig::default(),
        ));
        let wishlist = Wishlist::new(shared, clock, limiter, WishlistConfig::default());

        assert!(!wishlist.add_to_wishlist(studio("x")));
        assert!(!wishlist.is_in_wishlist("x"));
        assert_eq!(wishlist.popularity().item_score("x"), 0);

        // A retry counts the item once at most
        assert!(!wishlist.add_to_wishlist(studio("x")));
        assert_eq!(wishlist.popularity().item_score("x"), 0);
    }

    #[test]
    fn test_load_drops_malformed_records() {
        let (wishlist, storage, _) = fresh();
        storage
            .set(
                WISHLIST_KEY,
                r#"[
                    {"id":"good","name":"Good","slug":"good","location":"Canggu","rating":4.2,"type":"retreat","addedAt":"2024-01-01T00:00:00.000Z"},
                    {"id":"no-slug","name":"No Slug","type":"studio"},
                    {"id":"bad-type","name":"B","slug":"b","type":"spa"},
                    {"id":"bad id","name":"B","slug":"b","type":"studio"},
                    {"id":"good","name":"Duplicate","slug":"dup","type":"studio"},
                    {"id":"dirty","name":"<script>Evil</script>","slug":"dirty","rating":9,"type":"studio"},
                    42,
                    null
                ]"#,
            )
            .unwrap();

        let items = wishlist.wishlist_items();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["good", "dirty"]);
        assert_eq!(items[0].item_type, ItemType::Retreat);
        assert_eq!(items[1].name, "scriptEvil/script");
        assert_eq!(items[1].rating, 5.0);
    }

    #[test]
    fn test_load_coerces_loose_fields() {
        let (wishlist, storage, _) = fresh();
        storage
            .set(
                WISHLIST_KEY,
                r#"[
                    {"id":"a","name":"A","slug":"a","location":null,"rating":4.1,"type":"studio"},
                    {"id":"b","name":"B","slug":"b","location":"Ubud","rating":null,"type":"studio"},
                    {"id":"c","name":"C","slug":"c","duration":7,"price":null,"styles":["Yin",3],"type":"retreat"},
                    {"id":"d","name":"D","slug":"d","location":"Ubud","rating":4.0,"type":"studio","addedAt":"2024-01-01T00:00:00.000Z"}
                ]"#,
            )
            .unwrap();

        let items = wishlist.wishlist_items();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(items[0].location, "");
        assert_eq!(items[0].rating, 4.1);
        assert_eq!(items[1].rating, 0.0);
        assert_eq!(items[2].duration, None);
        assert_eq!(items[2].price, None);
        assert_eq!(items[2].styles, Some(vec!["Yin".to_string()]));
        assert_eq!(items[3].added_at, "2024-01-01T00:00:00.000Z");

        // Surviving records are written back intact on the next mutation
        assert!(wishlist.add_to_wishlist(studio("e")));
        assert_eq!(wishlist.wishlist_count(), 5);
    }

    #[test]
    fn test_long_text_is_capped() {
        let (wishlist, _, _) = fresh();
        let long = "u".repeat(150);
        let item = NewSavedItem::new("long", "Long", long.as_str(), ItemType::Studio)
            .with_location(long.as_str());

        assert!(wishlist.add_to_wishlist(item));
        let saved = &wishlist.wishlist_items()[0];
        assert_eq!(saved.location.len(), DEFAULT_MAX_STRING_LEN);
        assert_eq!(saved.slug.len(), DEFAULT_MAX_STRING_LEN);
    }

    #[test]
    fn test_corrupt_blob_is_empty() {
        let (wishlist, storage, _) = fresh();

        storage.set(WISHLIST_KEY, "not json").unwrap();
        assert_eq!(wishlist.wishlist_count(), 0);

        storage.set(WISHLIST_KEY, r#"{"id":"x"}"#).unwrap();
        assert_eq!(wishlist.wishlist_count(), 0);

        // A corrupt blob is replaced by the next successful add
        assert!(wishlist.add_to_wishlist(studio("fresh")));
        assert_eq!(wishlist.wishlist_count(), 1);
    }

    #[test]
    fn test_add_sanitizes_fields() {
        let (wishlist, _, _) = fresh();
        let item = NewSavedItem::new("clean-me", "  Yoga <b>Barn</b> ", "yoga", ItemType::Studio)
            .with_image("javascript:alert(1)")
            .with_styles(["Hatha", "<>", "Yin"])
            .with_rating(f64::NAN);

        assert!(wishlist.add_to_wishlist(item));
        let saved = &wishlist.wishlist_items()[0];
        assert_eq!(saved.name, "Yoga bBarn/b");
        assert_eq!(saved.image.as_deref(), Some("alert(1)"));
        assert_eq!(saved.styles, Some(vec!["Hatha".to_string(), "Yin".to_string()]));
        assert_eq!(saved.rating, 0.0);
    }

    #[test]
    fn test_clear_is_best_effort() {
        let (wishlist, storage, _) = fresh();

        for id in ["a", "b", "c"] {
            wishlist.add_to_wishlist(studio(id));
        }
        wishlist.clear_wishlist();

        assert_eq!(wishlist.wishlist_count(), 0);
        assert!(storage.get(WISHLIST_KEY).unwrap().is_none());
        for id in ["a", "b", "c"] {
            assert_eq!(wishlist.popularity().item_score(id), 0);
        }
    }

    #[test]
    fn test_clear_under_rate_limit_still_empties() {
        let (wishlist, _, _) = fresh();

        for i in 0..10 {
            wishlist.add_to_wishlist(studio(&format!("s{}", i)));
        }
        wishlist.clear_wishlist();

        assert_eq!(wishlist.wishlist_count(), 0);
        // No decrement was admitted
        assert_eq!(wishlist.popularity().item_score("s0"), 1);
    }

    #[test]
    fn test_sort_uses_current_popularity() {
        let (wishlist, _, _) = fresh();
        wishlist.add_to_wishlist(studio("b"));
        wishlist.add_to_wishlist(studio("b2"));
        wishlist.popularity().increment("b");

        let catalog = vec![
            crate::ranking::CatalogItem::new("a", "A", 4.5),
            crate::ranking::CatalogItem::new("b", "B", 4.4),
        ];
        let ranked = wishlist.sort_by_popularity_and_rating(&catalog);
        assert_eq!(ranked[0].id, "b");
    }

    #[test]
    fn test_config_validation() {
        assert!(WishlistConfig::default().validate().is_ok());
        assert!(WishlistConfig::default().with_max_items(0).validate().is_err());
        assert!(WishlistConfig::default().with_storage_key("").validate().is_err());
    }
}
