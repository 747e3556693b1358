//! One combine run: list sources, fetch them, merge, write.
use std::path::PathBuf;
use thiserror::Error;

use crate::config::Settings;
use crate::feed::{
    aggregate, collect, fetch_all, list_sources, write_feed, ChannelInfo, FetchOptions,
    OutputError, SourceList, SourceListError,
};

/// Errors that abort a run. Individual feed failures never do.
#[derive(Debug, Error)]
pub enum CombineError {
    #[error(transparent)]
    SourceList(#[from] SourceListError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// What to combine and where to put it.
#[derive(Debug, Clone)]
pub struct CombineRequest {
    pub sources: SourceList,
    pub output: PathBuf,
    pub channel: ChannelInfo,
    /// Drop entries whose link was already seen.
    pub dedup: bool,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CombineSummary {
    pub sources: usize,
    pub failed: usize,
    pub malformed: usize,
    /// Items written to the output document.
    pub entries: usize,
}

/// Runs the whole pipeline.
///
/// The output file is written even when every source fails or the list is
/// empty; it then holds a channel with no items.
///
/// # Errors
///
/// - [`CombineError::SourceList`] - the list of feeds could not be obtained
/// - [`CombineError::Output`] - the output document could not be written
pub async fn combine(
    client: &reqwest::Client,
    settings: &Settings,
    request: &CombineRequest,
) -> Result<CombineSummary, CombineError> {
    let sources = list_sources(client, &request.sources, settings).await?;
    if sources.is_empty() {
        tracing::warn!("Source list is empty, writing a feed with no items");
    }

    let reports = fetch_all(client, &sources, FetchOptions::from(settings)).await;
    let collected = collect(reports);
    tracing::debug!(
        entries = collected.entries.len(),
        failed = collected.failed,
        malformed = collected.malformed,
        "Collected entries"
    );

    let entries = aggregate(collected.entries, request.dedup);
    write_feed(&request.output, &request.channel, &entries)?;

    tracing::info!(
        path = %request.output.display(),
        entries = entries.len(),
        "Combined feed written"
    );

    Ok(CombineSummary {
        sources: sources.len(),
        failed: collected.failed,
        malformed: collected.malformed,
        entries: entries.len(),
    })
}
