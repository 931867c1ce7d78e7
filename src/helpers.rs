//! Shared helpers for cache-key derivation and input normalisation.
//!
//! Cache keys must be deterministic functions of the request parameters so
//! that identical requests inside a TTL window resolve to the same entry.

use md5::{Digest, Md5};

/// Normalise free text into a URL-style slug.
///
/// Lower-cases ASCII letters, keeps alphanumerics, and collapses every run of
/// other characters into a single `-`. Leading and trailing dashes are trimmed.
/// "Partly Cloudy" → "partly-cloudy", "  São  Paulo!" → "são-paulo".
pub(crate) fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Hex MD5 digest of a coordinate pair, formatted as `"<lat>_<lon>"`.
pub(crate) fn coordinate_hash(latitude: f64, longitude: f64) -> String {
    let digest = Md5::digest(format!("{}_{}", latitude, longitude).as_bytes());
    format!("{:x}", digest)
}

/// Normalise a hex colour: strips one leading `#` and upper-cases.
///
/// Returns `None` unless the remainder is 3 or 6 hex digits.
pub(crate) fn normalize_hex_color(raw: &str) -> Option<String> {
    let hex = raw.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    let valid_len = hex.len() == 3 || hex.len() == 6;
    if valid_len && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(hex.to_ascii_uppercase())
    } else {
        None
    }
}
