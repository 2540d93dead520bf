//! # Ranking Engine
//!
//! Orders catalog items by quality rating plus a logarithmic popularity boost.
//!
//! ```text
//!     score = rating + ln(popularity + 1) * 0.1
//!
//!     popularity   boost
//!          0       0.000
//!          2       0.110
//!         10       0.240
//!        100       0.462
//!      10000       0.921
//! ```
//!
//! The boost grows slowly, so no amount of saves lets one item bury the rest.
//! The multiplier `0.1`, the natural log and the `0.01` tie epsilon fix the
//! listing order; changing any of them reorders existing listings.
//!
//! Both orderings are pure functions of the items and the popularity map:
//! identical input always yields identical output.

use crate::popularity::PopularityScores;
use crate::validate::{clamp_popularity_score, is_valid_item_id};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Weight of the log-scaled popularity in the combined score.
pub const POPULARITY_BOOST_FACTOR: f64 = 0.1;

/// Combined scores closer than this fall through to the tie-breakers.
pub const SCORE_TIE_EPSILON: f64 = 0.01;

/// What the ranking engine reads from a catalog item.
pub trait Rankable {
    /// Catalog id, looked up in the popularity map.
    fn id(&self) -> &str;

    /// Quality rating, nominally `0.0..=5.0`.
    fn rating(&self) -> f64;

    /// Display name, the last tie-breaker.
    fn name(&self) -> &str;
}

/// Minimal catalog item as supplied by the catalog source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Catalog id.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Quality rating; absent ratings rank as `0.0`.
    #[serde(default)]
    pub rating: f64,
}

impl CatalogItem {
    /// Convenience constructor.
    pub fn new(id: impl Into<String>, name: impl Into<String>, rating: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rating,
        }
    }
}

impl Rankable for CatalogItem {
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

/// `ln(count + 1) * 0.1`, with `count` capped at the popularity maximum.
///
/// # Example
///
/// ```rust
/// use wishrank::calculate_popularity_boost;
///
/// assert_eq!(calculate_popularity_boost(0), 0.0);
/// assert!((calculate_popularity_boost(2) - 0.10986).abs() < 1e-5);
/// ```
#[inline]
pub fn calculate_popularity_boost(count: u32) -> f64 {
    (clamp_popularity_score(count) as f64 + 1.0).ln() * POPULARITY_BOOST_FACTOR
}

/// Popularity of `item`; `0` for unknown or malformed ids.
pub fn popularity_of<T: Rankable + ?Sized>(item: &T, scores: &PopularityScores) -> u32 {
    let id = item.id();
    if !is_valid_item_id(id) {
        return 0;
    }
    scores.get(id).copied().map(clamp_popularity_score).unwrap_or(0)
}

/// Combined ranking score of `item`: rating plus popularity boost.
pub fn ranking_score<T: Rankable + ?Sized>(item: &T, scores: &PopularityScores) -> f64 {
    finite_rating(item.rating()) + calculate_popularity_boost(popularity_of(item, scores))
}

/// Sort keys computed once per item.
struct RankKey<'a> {
    popularity: u32,
    rating: f64,
    score: f64,
    name: &'a str,
}

impl<'a> RankKey<'a> {
    fn new<T: Rankable>(item: &'a T, scores: &PopularityScores) -> Self {
        let popularity = popularity_of(item, scores);
        let rating = finite_rating(item.rating());
        Self {
            popularity,
            rating,
            score: rating + calculate_popularity_boost(popularity),
            name: item.name(),
        }
    }
}

/// Orders `items` best first by `rating + boost(popularity)`.
///
/// Scores within [`SCORE_TIE_EPSILON`] of each other are treated as tied and
/// ordered by descending popularity, then descending rating, then name. The
/// sort is stable.
///
/// # Example
///
/// ```rust
/// use wishrank::{sort_by_popularity_and_rating, CatalogItem, PopularityScores};
///
/// let items = vec![
///     CatalogItem::new("a", "Alpha Shala", 4.5),
///     CatalogItem::new("b", "Bamboo Yoga", 4.4),
/// ];
/// let mut scores = PopularityScores::new();
/// scores.insert("b".to_string(), 2);
///
/// let ranked = sort_by_popularity_and_rating(&items, &scores);
/// assert_eq!(ranked[0].id, "b");
/// ```
pub fn sort_by_popularity_and_rating<T: Rankable + Clone>(
    items: &[T],
    scores: &PopularityScores,
) -> Vec<T> {
    sort_with_keys(items, scores, compare_combined)
}

/// Orders `items` by descending popularity, then descending rating, then name.
///
/// For listings where the rating should not contribute to placement beyond
/// breaking ties.
pub fn sort_by_popularity<T: Rankable + Clone>(items: &[T], scores: &PopularityScores) -> Vec<T> {
    sort_with_keys(items, scores, compare_popularity)
}

fn compare_combined(a: &RankKey<'_>, b: &RankKey<'_>) -> Ordering {
    if (a.score - b.score).abs() > SCORE_TIE_EPSILON {
        return cmp_f64(b.score, a.score);
    }
    compare_popularity(a, b)
}

fn compare_popularity(a: &RankKey<'_>, b: &RankKey<'_>) -> Ordering {
    b.popularity
        .cmp(&a.popularity)
        .then_with(|| cmp_f64(b.rating, a.rating))
        .then_with(|| locale_cmp(a.name, b.name))
}

fn sort_with_keys<T, F>(items: &[T], scores: &PopularityScores, compare: F) -> Vec<T>
where
    T: Rankable + Clone,
    F: Fn(&RankKey<'_>, &RankKey<'_>) -> Ordering,
{
    let keys: Vec<RankKey<'_>> = items.iter().map(|item| RankKey::new(item, scores)).collect();
    let mut order: Vec<usize> = (0..items.len()).collect();

    let by_key = |a: &usize, b: &usize| compare(&keys[*a], &keys[*b]);
    merge_sort_by(&mut order, &by_key);

    order.into_iter().map(|i| items[i].clone()).collect()
}

/// Stable top-down merge sort.
///
/// The epsilon comparison is not transitive (a≈b and b≈c do not imply a≈c),
/// and `slice::sort_by` may panic on comparators that are not a total order.
/// Merge sort only ever asks "is right strictly before left", so it finishes
/// with a deterministic order for any comparator.
fn merge_sort_by<T: Copy, F>(v: &mut [T], compare: &F)
where
    F: Fn(&T, &T) -> Ordering,
{
    let len = v.len();
    if len <= 1 {
        return;
    }

    let mid = len / 2;
    merge_sort_by(&mut v[..mid], compare);
    merge_sort_by(&mut v[mid..], compare);

    let mut merged = Vec::with_capacity(len);
    let (mut i, mut j) = (0, mid);
    while i < mid && j < len {
        if compare(&v[j], &v[i]) == Ordering::Less {
            merged.push(v[j]);
            j += 1;
        } else {
            merged.push(v[i]);
            i += 1;
        }
    }
    merged.extend_from_slice(&v[i..mid]);
    merged.extend_from_slice(&v[j..len]);
    v.copy_from_slice(&merged);
}

/// Name order that ignores accents and case first.
///
/// Names are compared on their base letters (canonical decomposition with
/// combining marks dropped, lowercased). Names equal on that level order
/// unaccented before accented, then lowercase before uppercase, then by
/// code point.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| {
            a.chars()
                .flat_map(char::to_lowercase)
                .cmp(b.chars().flat_map(char::to_lowercase))
        })
        .then_with(|| {
            a.chars()
                .map(char::is_uppercase)
                .cmp(b.chars().map(char::is_uppercase))
        })
        .then_with(|| a.cmp(b))
}

fn base_letters(name: &str) -> impl Iterator<Item = char> + '_ {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

#[inline]
fn finite_rating(rating: f64) -> f64 {
    if rating.is_finite() {
        rating
    } else {
        0.0
    }
}

#[inline]
fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}
