use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::Settings;
use crate::feed::fetcher::{get_bytes, FetchError, FetchOptions};
use crate::feed::FeedSource;
use crate::util::{non_blank, validate_url, UrlValidationError};

/// Largest local feed config accepted (1 MB).
const MAX_CONFIG_SIZE: u64 = 1_048_576;

/// The list of feeds could not be obtained. Always fatal for a run.
#[derive(Debug, Error)]
pub enum SourceListError {
    #[error("Failed to read feed config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Feed config too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Invalid feed config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid source list URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),

    #[error("Failed to fetch source list: {0}")]
    Fetch(#[from] FetchError),

    #[error("Invalid CSV in source list: {0}")]
    Csv(#[from] csv::Error),
}

/// Where the list of feeds comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceList {
    /// Local JSON file: `{"feeds": ["https://...", ...]}`
    ConfigFile(PathBuf),
    /// Published spreadsheet exported as CSV; feed URLs in the first column.
    Spreadsheet(String),
}

#[derive(Debug, Deserialize)]
struct FeedConfig {
    feeds: Vec<String>,
    #[serde(flatten)]
    extra: HashMap<String, serde_json::Value>,
}

/// Resolves a [`SourceList`] into feed sources, in list order.
pub async fn list_sources(
    client: &reqwest::Client,
    list: &SourceList,
    settings: &Settings,
) -> Result<Vec<FeedSource>, SourceListError> {
    let sources = match list {
        SourceList::ConfigFile(path) => load_config_file(path).await?,
        SourceList::Spreadsheet(url) => fetch_spreadsheet(client, url, settings).await?,
    };
    tracing::info!(count = sources.len(), "Loaded feed sources");
    Ok(sources)
}

/// Reads feed URLs from a local JSON config file.
///
/// # Errors
///
/// Missing or unreadable file, a file over 1 MB, invalid JSON, or a
/// missing `feeds` list.
pub async fn load_config_file(path: &Path) -> Result<Vec<FeedSource>, SourceListError> {
    let io_error = |source: std::io::Error| SourceListError::Io {
        path: path.to_path_buf(),
        source,
    };

    let size = tokio::fs::metadata(path).await.map_err(io_error)?.len();
    if size > MAX_CONFIG_SIZE {
        return Err(SourceListError::TooLarge {
            size,
            max: MAX_CONFIG_SIZE,
        });
    }

    let content = tokio::fs::read_to_string(path).await.map_err(io_error)?;
    parse_config(&content)
}

/// Parses the `{"feeds": [...]}` document. Blank entries are skipped.
pub fn parse_config(content: &str) -> Result<Vec<FeedSource>, SourceListError> {
    let config: FeedConfig = serde_json::from_str(content)?;

    for key in config.extra.keys() {
        tracing::warn!(key = %key, "Unknown key in feed config, ignoring");
    }

    Ok(config
        .feeds
        .iter()
        .filter_map(|url| non_blank(url))
        .map(FeedSource::from)
        .collect())
}

/// Downloads a published spreadsheet (CSV export) and reads feed URLs from
/// its first column.
///
/// # Errors
///
/// Any failure is fatal: invalid URL, network error, timeout, non-2xx
/// status, oversized body, or undecodable CSV.
pub async fn fetch_spreadsheet(
    client: &reqwest::Client,
    url: &str,
    settings: &Settings,
) -> Result<Vec<FeedSource>, SourceListError> {
    let options = FetchOptions::from(settings);
    let validated = validate_url(url, options.host_policy)?;
    let bytes = get_bytes(client, validated.as_str(), &options).await?;
    parse_csv(&bytes, settings.csv_has_header)
}

/// First cell of every row, trimmed. Empty rows and blank cells are skipped.
pub fn parse_csv(bytes: &[u8], has_header: bool) -> Result<Vec<FeedSource>, SourceListError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .from_reader(bytes);

    let mut sources = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(url) = record.get(0).and_then(non_blank) {
            sources.push(FeedSource::from(url));
        }
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::HostPolicy;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn urls(sources: &[FeedSource]) -> Vec<&str> {
        sources.iter().map(FeedSource::as_str).collect()
    }

    fn local_settings() -> Settings {
        Settings {
            allow_private_hosts: true,
            ..Settings::default()
        }
    }

    #[test]
    fn test_parse_config() {
        let content = r#"{"feeds": ["https://a.example/rss", "  https://b.example/atom  ", ""]}"#;
        let sources = parse_config(content).unwrap();
        assert_eq!(
            urls(&sources),
            vec!["https://a.example/rss", "https://b.example/atom"]
        );
    }

    #[test]
    fn test_parse_config_keeps_duplicates_and_order() {
        let content = r#"{"feeds": ["https://z.example/", "https://a.example/", "https://z.example/"]}"#;
        let sources = parse_config(content).unwrap();
        assert_eq!(
            urls(&sources),
            vec!["https://z.example/", "https://a.example/", "https://z.example/"]
        );
    }

    #[test]
    fn test_parse_config_empty_list() {
        assert!(parse_config(r#"{"feeds": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_config_unknown_keys_accepted() {
        let content = r#"{"feeds": ["https://a.example/"], "title": "ignored"}"#;
        assert_eq!(parse_config(content).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_config_missing_feeds_key() {
        let err = parse_config(r#"{"urls": []}"#).unwrap_err();
        assert!(matches!(err, SourceListError::Json(_)));
    }

    #[test]
    fn test_parse_config_invalid_json() {
        assert!(matches!(
            parse_config("{feeds: oops"),
            Err(SourceListError::Json(_))
        ));
        assert!(matches!(
            parse_config(r#"{"feeds": [1, 2]}"#),
            Err(SourceListError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_load_config_file() {
        let dir = std::env::temp_dir().join("rss_combiner_sources_config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feeds.json");
        std::fs::write(&path, r#"{"feeds": ["https://a.example/rss"]}"#).unwrap();

        let sources = load_config_file(&path).await.unwrap();
        assert_eq!(urls(&sources), vec!["https://a.example/rss"]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_load_missing_config_file() {
        let path = Path::new("/tmp/rss_combiner_no_such_feeds.json");
        let err = load_config_file(path).await.unwrap_err();
        assert!(matches!(err, SourceListError::Io { .. }));
        assert!(err.to_string().contains("rss_combiner_no_such_feeds.json"));
    }

    #[test]
    fn test_parse_csv_first_column() {
        let csv = "https://a.example/rss,Alpha\n\n  ,blank first cell\nhttps://b.example/feed\n\"https://c.example/x,y\",quoted\n";
        let sources = parse_csv(csv.as_bytes(), false).unwrap();
        assert_eq!(
            urls(&sources),
            vec![
                "https://a.example/rss",
                "https://b.example/feed",
                "https://c.example/x,y"
            ]
        );
    }

    #[test]
    fn test_parse_csv_header_row() {
        let csv = "Feed URL,Name\nhttps://a.example/rss,Alpha\n";
        assert_eq!(
            urls(&parse_csv(csv.as_bytes(), true).unwrap()),
            vec!["https://a.example/rss"]
        );
        assert_eq!(parse_csv(csv.as_bytes(), false).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_csv_empty() {
        assert!(parse_csv(b"", false).unwrap().is_empty());
    }

    #[test]
    fn test_parse_csv_invalid_utf8() {
        let bytes = b"https://a.example/\xff\xfe,x\n";
        assert!(matches!(
            parse_csv(bytes, false),
            Err(SourceListError::Csv(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_spreadsheet() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sheet.csv"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("https://a.example/rss\nhttps://b.example/rss\n")
                    .insert_header("Content-Type", "text/csv"),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/sheet.csv", mock_server.uri());
        let sources = fetch_spreadsheet(&reqwest::Client::new(), &url, &local_settings())
            .await
            .unwrap();
        assert_eq!(
            urls(&sources),
            vec!["https://a.example/rss", "https://b.example/rss"]
        );
    }

    #[tokio::test]
    async fn test_fetch_spreadsheet_bad_status_is_fatal() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let url = format!("{}/sheet.csv", mock_server.uri());
        let err = fetch_spreadsheet(&reqwest::Client::new(), &url, &local_settings())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SourceListError::Fetch(FetchError::HttpStatus(500))
        ));
    }

    #[tokio::test]
    async fn test_fetch_spreadsheet_private_host_rejected() {
        let settings = Settings::default();
        assert_eq!(settings.host_policy(), HostPolicy::PublicOnly);

        let err = fetch_spreadsheet(
            &reqwest::Client::new(),
            "http://127.0.0.1:9/sheet.csv",
            &settings,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SourceListError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_list_sources_from_config_file() {
        let dir = std::env::temp_dir().join("rss_combiner_sources_list");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feeds.json");
        std::fs::write(&path, r#"{"feeds": ["https://a.example/rss", "https://b.example/rss"]}"#)
            .unwrap();

        let sources = list_sources(
            &reqwest::Client::new(),
            &SourceList::ConfigFile(path),
            &Settings::default(),
        )
        .await
        .unwrap();
        assert_eq!(sources.len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }
}
