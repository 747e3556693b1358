use std::collections::HashSet;

use crate::feed::normalize::normalize;
use crate::feed::{NormalizedEntry, SourceReport};

/// Entries gathered from every source, plus what went wrong along the way.
#[derive(Debug, Default)]
pub struct Collected {
    /// Source order, then document order within each source.
    pub entries: Vec<NormalizedEntry>,
    pub failed: usize,
    pub malformed: usize,
}

/// Normalizes and concatenates per-source results in the order given.
///
/// Failed sources are logged and contribute nothing; malformed ones are
/// logged and used anyway.
pub fn collect(reports: Vec<SourceReport>) -> Collected {
    let mut collected = Collected::default();

    for report in reports {
        match report.result {
            Ok(feed) => {
                if feed.malformed {
                    collected.malformed += 1;
                    tracing::warn!(
                        feed = %report.source,
                        entries = feed.entries.len(),
                        "Feed is not well-formed, using recovered entries"
                    );
                }
                tracing::debug!(feed = %report.source, entries = feed.entries.len(), "Feed parsed");
                collected
                    .entries
                    .extend(feed.entries.into_iter().map(normalize));
            }
            Err(e) => {
                collected.failed += 1;
                tracing::warn!(feed = %report.source, error = %e, "Skipping feed");
            }
        }
    }

    collected
}

/// Orders entries newest first and optionally drops repeated links.
///
/// The sort is stable, so entries with equal timestamps keep their
/// source/document order. Deduplication runs after sorting, so the newest
/// copy of a link is the one kept.
pub fn aggregate(mut entries: Vec<NormalizedEntry>, dedup: bool) -> Vec<NormalizedEntry> {
    entries.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    if dedup {
        deduplicate(entries)
    } else {
        entries
    }
}

/// Keeps the first entry for each link. Entries without a link are never
/// treated as duplicates of one another.
pub fn deduplicate(entries: Vec<NormalizedEntry>) -> Vec<NormalizedEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| entry.link.is_empty() || seen.insert(entry.link.clone()))
        .collect()
}
