use futures::stream::{self, StreamExt};
use std::time::Duration;
use thiserror::Error;

use crate::config::Settings;
use crate::feed::parser::{parse_feed, ParsedFeed};
use crate::feed::{FeedSource, FetchedFeed, SourceReport};
use crate::util::{validate_url, HostPolicy, UrlValidationError};

/// Errors that can occur while fetching a single document.
///
/// For feeds these are recoverable: the source is skipped and the run
/// continues. The source-list fetch wraps them as fatal.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL failed scheme or host validation
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[source] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Document could not be parsed as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(e)
        }
    }
}

/// Limits applied to every request of a run.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub max_bytes: usize,
    pub host_policy: HostPolicy,
    /// Feeds in flight at once. 1 = sequential.
    pub concurrency: usize,
}

impl From<&Settings> for FetchOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            timeout: settings.request_timeout(),
            max_bytes: settings.max_feed_bytes.max(1),
            host_policy: settings.host_policy(),
            concurrency: settings.max_concurrent_fetches.max(1),
        }
    }
}

/// Builds the HTTP client shared by every request of a run.
pub fn build_client(settings: &Settings) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(settings.request_timeout())
        .user_agent(settings.user_agent())
        .build()
}

/// Fetches and parses every source.
///
/// Up to `options.concurrency` requests run at once, but reports come back
/// in the order of `sources`, whatever order the requests finish in. A
/// failing source yields an `Err` report; it never stops the others.
pub async fn fetch_all(
    client: &reqwest::Client,
    sources: &[FeedSource],
    options: FetchOptions,
) -> Vec<SourceReport> {
    if sources.is_empty() {
        return Vec::new();
    }

    stream::iter(sources.iter().cloned())
        .map(|source| {
            let client = client.clone();
            async move {
                let result = fetch_feed(&client, &source, &options).await;
                SourceReport { source, result }
            }
        })
        .buffered(options.concurrency.max(1))
        .collect()
        .await
}

/// Fetches one source and parses it into raw entries.
///
/// # Errors
///
/// - [`FetchError::InvalidUrl`] - URL rejected before any request
/// - [`FetchError::Network`] - Connection or TLS errors
/// - [`FetchError::Timeout`] - Request exceeded the timeout
/// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
/// - [`FetchError::ResponseTooLarge`] - Body exceeded the size limit
/// - [`FetchError::Parse`] - Not a feed, even after repair
pub async fn fetch_feed(
    client: &reqwest::Client,
    source: &FeedSource,
    options: &FetchOptions,
) -> Result<FetchedFeed, FetchError> {
    let url = validate_url(source.as_str(), options.host_policy)?;
    let bytes = get_bytes(client, url.as_str(), options).await?;

    let ParsedFeed { entries, malformed } =
        parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

    Ok(FetchedFeed { entries, malformed })
}

/// Single GET with timeout, status check and size limit. No retries.
pub(crate) async fn get_bytes(
    client: &reqwest::Client,
    url: &str,
    options: &FetchOptions,
) -> Result<Vec<u8>, FetchError> {
    let response = tokio::time::timeout(options.timeout, client.get(url).send())
        .await
        .map_err(|_| FetchError::Timeout)??;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    tokio::time::timeout(
        options.timeout,
        read_limited_bytes(response, options.max_bytes),
    )
    .await
    .map_err(|_| FetchError::Timeout)?
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
