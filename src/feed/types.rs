use chrono::{DateTime, Utc};
use std::fmt;

use crate::feed::FetchError;

/// A feed to retrieve, named by its URL.
///
/// Produced by the source lister, consumed once by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedSource(String);

impl FeedSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeedSource {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for FeedSource {
    fn from(url: String) -> Self {
        Self(url)
    }
}

/// An entry as the feed document described it.
///
/// Every field is optional because RSS 0.9x/1.0/2.0, Atom and JSON Feed
/// disagree on what an entry must carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    /// Date the feed parser understood (`published`, else `updated`).
    pub published: Option<DateTime<Utc>>,
    /// Date text exactly as written, kept for a second parsing attempt.
    pub published_text: Option<String>,
}

/// The canonical entry every later stage works with. No field is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published_at: DateTime<Utc>,
}

/// Entries extracted from one successfully parsed document.
#[derive(Debug, Clone, Default)]
pub struct FetchedFeed {
    pub entries: Vec<RawEntry>,
    /// The document was not well-formed XML but entries were still recovered.
    pub malformed: bool,
}

/// Outcome of fetching one source.
#[derive(Debug)]
pub struct SourceReport {
    pub source: FeedSource,
    pub result: Result<FetchedFeed, FetchError>,
}
