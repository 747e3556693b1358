//! Feed handling: from a list of sources to one combined RSS document.
//!
//! - **Sources**: read feed URLs from a JSON config file or a CSV spreadsheet
//! - **Fetching**: bounded-concurrency HTTP retrieval, one report per source
//! - **Parsing**: RSS/Atom/JSON Feed via `feed-rs`, with malformed-XML recovery
//! - **Normalizing**: map raw entries onto a single record shape
//! - **Aggregating**: newest-first ordering with optional link dedup
//! - **Writing**: RSS 2.0 output, replaced atomically
//!
//! # Example
//!
//! ```ignore
//! use rss_combiner::feed::{aggregate, collect, fetch_all, write_feed, ChannelInfo};
//!
//! let reports = fetch_all(&client, &sources, FetchOptions::from(&settings)).await;
//! let collected = collect(reports);
//! let entries = aggregate(collected.entries, true);
//! write_feed(&path, &ChannelInfo::titled("Combined Feed"), &entries)?;
//! ```

mod aggregate;
mod fetcher;
mod normalize;
mod parser;
mod sources;
mod types;
mod writer;

pub use aggregate::{aggregate, collect, deduplicate, Collected};
pub use fetcher::{build_client, fetch_all, fetch_feed, FetchError, FetchOptions};
pub use normalize::{normalize, normalize_at, resolve_published, UNTITLED};
pub use parser::{parse_feed, ParseError, ParsedFeed};
pub use sources::{
    fetch_spreadsheet, list_sources, load_config_file, parse_config, parse_csv, SourceList,
    SourceListError,
};
pub use types::{FeedSource, FetchedFeed, NormalizedEntry, RawEntry, SourceReport};
pub use writer::{render_rss, write_feed, ChannelInfo, OutputError};
