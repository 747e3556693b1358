//! Settings file parser for ~/.config/rss-combiner/settings.toml.
//!
//! The settings file is optional: a missing file yields `Settings::default()`.
//! Unknown keys are accepted by serde but logged as warnings, since they are
//! almost always typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::util::HostPolicy;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in settings file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Settings file exceeds maximum allowed size.
    #[error("Settings file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Settings
// ============================================================================

/// Runtime settings for a combine run.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Channel title used when `--title` is not given.
    pub title: String,

    /// Optional `<link>` for the output channel.
    pub channel_link: Option<String>,

    /// Optional `<description>` for the output channel.
    pub channel_description: Option<String>,

    /// Per-request timeout in seconds, applied to the source list and every feed.
    pub request_timeout_secs: u64,

    /// Number of feeds fetched at once. 1 = strictly sequential.
    pub max_concurrent_fetches: usize,

    /// Largest response body accepted, in bytes.
    pub max_feed_bytes: usize,

    /// `User-Agent` header override.
    pub user_agent: Option<String>,

    /// Allow fetching from localhost and private networks.
    pub allow_private_hosts: bool,

    /// Skip the first row of a spreadsheet source list.
    pub csv_has_header: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title: "Combined Feed".to_string(),
            channel_link: None,
            channel_description: None,
            request_timeout_secs: 30,
            max_concurrent_fetches: 10,
            max_feed_bytes: 10 * 1024 * 1024,
            user_agent: None,
            allow_private_hosts: false,
            csv_has_header: false,
        }
    }
}

impl Settings {
    /// Maximum settings file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "title",
        "channel_link",
        "channel_description",
        "request_timeout_secs",
        "max_concurrent_fetches",
        "max_feed_bytes",
        "user_agent",
        "allow_private_hosts",
        "csv_has_header",
    ];

    /// Load settings from a TOML file.
    ///
    /// - Missing file → `Ok(Settings::default())`
    /// - Empty file → `Ok(Settings::default())`
    /// - Invalid TOML or wrong value types → `Err(ConfigError::Parse)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Settings file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Settings file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Settings file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in settings file, ignoring");
                }
            }
        }

        let settings: Settings = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded settings");
        Ok(settings.clamped())
    }

    /// Default settings location: `$HOME/.config/rss-combiner/settings.toml`.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("rss-combiner")
                .join("settings.toml"),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn host_policy(&self) -> HostPolicy {
        HostPolicy::from_allow_private(self.allow_private_hosts)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("rss-combiner/{}", env!("CARGO_PKG_VERSION")))
    }

    /// Zero timeouts, limits and pool sizes would stall or reject everything.
    fn clamped(mut self) -> Self {
        self.request_timeout_secs = self.request_timeout_secs.max(1);
        self.max_concurrent_fetches = self.max_concurrent_fetches.max(1);
        self.max_feed_bytes = self.max_feed_bytes.max(1);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_settings(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("rss_combiner_settings_{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.title, "Combined Feed");
        assert_eq!(settings.request_timeout_secs, 30);
        assert_eq!(settings.max_concurrent_fetches, 10);
        assert_eq!(settings.max_feed_bytes, 10 * 1024 * 1024);
        assert!(!settings.allow_private_hosts);
        assert!(!settings.csv_has_header);
        assert!(settings.channel_link.is_none());
        assert_eq!(settings.host_policy(), HostPolicy::PublicOnly);
        assert!(settings.user_agent().starts_with("rss-combiner/"));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/rss_combiner_test_nonexistent_settings.toml");
        let settings = Settings::load(path).unwrap();
        assert_eq!(settings.title, "Combined Feed");
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_settings("whitespace", "   \n  \n  ");
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.request_timeout_secs, 30);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_settings_use_defaults_for_missing() {
        let (dir, path) = write_settings("partial", "title = \"Morning Reading\"\n");
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.title, "Morning Reading");
        assert_eq!(settings.max_concurrent_fetches, 10);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_settings() {
        let content = r#"
title = "Everything"
channel_link = "https://example.com/"
channel_description = "All my feeds"
request_timeout_secs = 5
max_concurrent_fetches = 2
max_feed_bytes = 2048
user_agent = "custom-agent/1.0"
allow_private_hosts = true
csv_has_header = true
"#;
        let (dir, path) = write_settings("full", content);
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.title, "Everything");
        assert_eq!(settings.channel_link.as_deref(), Some("https://example.com/"));
        assert_eq!(settings.channel_description.as_deref(), Some("All my feeds"));
        assert_eq!(settings.request_timeout(), Duration::from_secs(5));
        assert_eq!(settings.max_concurrent_fetches, 2);
        assert_eq!(settings.max_feed_bytes, 2048);
        assert_eq!(settings.user_agent(), "custom-agent/1.0");
        assert_eq!(settings.host_policy(), HostPolicy::AllowPrivate);
        assert!(settings.csv_has_header);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let content = "request_timeout_secs = 0\nmax_concurrent_fetches = 0\nmax_feed_bytes = 0\n";
        let (dir, path) = write_settings("zero", content);
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.request_timeout_secs, 1);
        assert_eq!(settings.max_concurrent_fetches, 1);
        assert_eq!(settings.max_feed_bytes, 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_settings("invalid", "this is not [valid toml");
        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = write_settings("wrongtype", "max_concurrent_fetches = \"many\"\n");
        assert!(matches!(Settings::load(&path), Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_settings("unknown", "title = \"T\"\ntotally_fake_key = 42\n");
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.title, "T");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_settings("too_large", &"a".repeat(1_048_577));
        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
