//! # Input Validation and Sanitization
//!
//! Pure guards applied at every boundary: input from the UI, values read back
//! from storage, and values about to be written. Nothing here fails; bad input
//! is turned into `false`, `0` or an empty string.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Maximum length of an item identifier.
pub const MAX_ITEM_ID_LEN: usize = 50;

/// Upper bound of any popularity score.
pub const MAX_POPULARITY_SCORE: u32 = 10_000;

/// Default cap applied by [`sanitize_string`] callers that have no field-specific limit.
pub const DEFAULT_MAX_STRING_LEN: usize = 100;

/// Returns `true` iff `id` is 1 to 50 ASCII letters, digits, `-` or `_`.
///
/// # Example
///
/// ```rust
/// use wishrank::is_valid_item_id;
///
/// assert!(is_valid_item_id("studio-42_b"));
/// assert!(!is_valid_item_id("bad id!"));
/// assert!(!is_valid_item_id(""));
/// ```
pub fn is_valid_item_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ITEM_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Returns `true` iff `item_type` names a known catalog item kind.
pub fn is_valid_item_type(item_type: &str) -> bool {
    item_type.parse::<ItemType>().is_ok()
}

/// Kind of catalog item that can be saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// A yoga studio.
    Studio,
    /// A retreat.
    Retreat,
}

impl ItemType {
    /// Wire name of the item type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Studio => "studio",
            Self::Retreat => "retreat",
        }
    }
}

impl FromStr for ItemType {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "studio" => Ok(Self::Studio),
            "retreat" => Ok(Self::Retreat),
            _ => Err("item type must be \"studio\" or \"retreat\""),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strips markup and script-protocol fragments, trims, and caps the length.
///
/// Removes every `<`, `>`, `'`, `"` and `&`, then every case-insensitive
/// occurrence of `javascript:` and `data:`, trims surrounding whitespace and
/// keeps at most `max_len` characters.
///
/// # Example
///
/// ```rust
/// use wishrank::sanitize_string;
///
/// assert_eq!(sanitize_string("  <b>Ubud</b> ", 100), "bUbud/b");
/// assert_eq!(sanitize_string("JavaScript:alert(1)", 100), "alert(1)");
/// assert_eq!(sanitize_string("Canggu Shala", 6), "Canggu");
/// ```
pub fn sanitize_string(input: &str, max_len: usize) -> String {
    let stripped: String = input
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '\'' | '"' | '&'))
        .collect();

    let stripped = remove_ascii_ci(&stripped, "javascript:");
    let stripped = remove_ascii_ci(&stripped, "data:");

    stripped.trim().chars().take(max_len).collect()
}

/// [`sanitize_string`] for an untyped JSON value; anything but a string yields `""`.
pub fn sanitize_value(value: &Value, max_len: usize) -> String {
    match value {
        Value::String(s) => sanitize_string(s, max_len),
        _ => String::new(),
    }
}

/// Removes every non-overlapping, ASCII-case-insensitive occurrence of `needle`
/// in a single left-to-right pass.
fn remove_ascii_ci(haystack: &str, needle: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with `haystack`.
    let lowered = haystack.to_ascii_lowercase();
    let mut out = String::with_capacity(haystack.len());
    let mut rest = 0;

    while let Some(pos) = lowered[rest..].find(needle) {
        out.push_str(&haystack[rest..rest + pos]);
        rest += pos + needle.len();
    }
    out.push_str(&haystack[rest..]);
    out
}

/// Parses a persisted popularity value.
///
/// Returns `None` for anything that is not a non-negative integer (floats with
/// no fractional part count as integers). Valid values are capped at
/// [`MAX_POPULARITY_SCORE`].
pub fn parse_popularity_score(value: &Value) -> Option<u32> {
    let Value::Number(n) = value else {
        return None;
    };

    let raw = if let Some(u) = n.as_u64() {
        u
    } else if let Some(f) = n.as_f64() {
        if !f.is_finite() || f.fract() != 0.0 || f < 0.0 {
            return None;
        }
        // Saturating float-to-int cast; anything this large is capped below anyway.
        f as u64
    } else {
        return None;
    };

    Some(raw.min(MAX_POPULARITY_SCORE as u64) as u32)
}

/// Coerces a value to a popularity score in `[0, 10000]`; invalid input yields `0`.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use wishrank::validate_popularity_score;
///
/// assert_eq!(validate_popularity_score(&json!(7)), 7);
/// assert_eq!(validate_popularity_score(&json!(25_000)), 10_000);
/// assert_eq!(validate_popularity_score(&json!(-3)), 0);
/// assert_eq!(validate_popularity_score(&json!(2.5)), 0);
/// assert_eq!(validate_popularity_score(&json!("12")), 0);
/// ```
pub fn validate_popularity_score(value: &Value) -> u32 {
    parse_popularity_score(value).unwrap_or(0)
}

/// Caps an already-typed count at [`MAX_POPULARITY_SCORE`].
#[inline]
pub fn clamp_popularity_score(count: u32) -> u32 {
    count.min(MAX_POPULARITY_SCORE)
}
