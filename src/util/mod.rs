//! Utility functions shared by the feed pipeline.
//!
//! - **URL validation**: scheme and host checks applied before any fetch
//! - **Dates**: permissive RFC 822 parsing and RSS `<pubDate>` formatting
//! - **Text**: XML-safe character filtering
//!
//! # Examples
//!
//! ```
//! use rss_combiner::util::{format_rfc822, parse_rfc822, validate_url, HostPolicy};
//!
//! let url = validate_url("https://example.com/feed.xml", HostPolicy::PublicOnly).unwrap();
//! assert_eq!(url.scheme(), "https");
//!
//! let dt = parse_rfc822("Tue, 03 Jun 2025 10:00:00 GMT").unwrap();
//! assert_eq!(format_rfc822(&dt), "Tue, 03 Jun 2025 10:00:00 GMT");
//! ```

mod date;
mod text;
mod url_validator;

pub use date::{format_rfc822, parse_rfc822};
pub use text::{is_xml_char, non_blank, strip_invalid_xml_chars};
pub use url_validator::{validate_url, HostKind, HostPolicy, UrlValidationError};
