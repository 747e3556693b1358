use chrono::{DateTime, Utc};

use crate::feed::{NormalizedEntry, RawEntry};
use crate::util::parse_rfc822;

/// Title given to entries that have none.
pub const UNTITLED: &str = "No Title";

/// Maps a raw entry onto the canonical record, stamping undated entries with
/// the current time.
pub fn normalize(raw: RawEntry) -> NormalizedEntry {
    normalize_at(raw, Utc::now())
}

/// [`normalize`] with an explicit fallback instant.
///
/// Date resolution, first success wins:
/// 1. the date the feed parser produced
/// 2. the raw date text, through [`parse_rfc822`]
/// 3. `now`
pub fn normalize_at(raw: RawEntry, now: DateTime<Utc>) -> NormalizedEntry {
    let published_at = resolve_published(&raw).unwrap_or(now);

    NormalizedEntry {
        title: raw
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNTITLED.to_string()),
        link: raw.link.map(|l| l.trim().to_string()).unwrap_or_default(),
        summary: raw.summary.unwrap_or_default(),
        published_at,
    }
}

/// The entry's own publication date, if it has a usable one.
pub fn resolve_published(raw: &RawEntry) -> Option<DateTime<Utc>> {
    raw.published
        .or_else(|| raw.published_text.as_deref().and_then(parse_rfc822))
}
