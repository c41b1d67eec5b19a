//! Common type definitions.
//!
//! - Type aliases for entity IDs
//! - [`slugify`]: URL slug for review titles
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

// Type aliases for IDs
pub type SubscriberId = Uuid;
pub type OutboxEntryId = Uuid;
pub type ReviewId = Uuid;

static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\s-]").expect("valid regex"));
static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Turn a title into the slug used in review URLs.
///
/// Lowercases and trims, drops everything that is not a word character, whitespace or `-`, then
/// replaces each whitespace run with a single `-`.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = NON_SLUG_CHARS.replace_all(lowered.trim(), "");
    WHITESPACE_RUNS.replace_all(&stripped, "-").into_owned()
}

/// Abbreviate a UUID to its first 8 characters for more readable logs.
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}
