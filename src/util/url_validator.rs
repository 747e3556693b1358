use std::net::IpAddr;
use thiserror::Error;
use url::{Host, Url};

#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    Parse(#[from] url::ParseError),

    #[error("Unsupported scheme '{0}', expected http or https")]
    Scheme(String),

    /// Host is loopback, private or link-local and the policy is `PublicOnly`.
    #[error("Refusing non-public host '{host}' ({kind})")]
    NonPublicHost { host: String, kind: HostKind },
}

/// Which hosts a fetched URL may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostPolicy {
    #[default]
    PublicOnly,
    /// Local test servers and intranet feeds.
    AllowPrivate,
}

impl HostPolicy {
    pub fn from_allow_private(allow_private: bool) -> Self {
        if allow_private {
            Self::AllowPrivate
        } else {
            Self::PublicOnly
        }
    }

    pub fn permits(self, kind: HostKind) -> bool {
        matches!((self, kind), (Self::AllowPrivate, _) | (_, HostKind::Public))
    }
}

/// Reachability class of a URL host. Domain names other than `localhost`
/// count as public; they are not resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    Public,
    Loopback,
    Private,
}

impl std::fmt::Display for HostKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Public => "public",
            Self::Loopback => "loopback",
            Self::Private => "private network",
        })
    }
}

/// Parses `url_str` and checks it against `policy`.
///
/// Only `http` and `https` are ever accepted, whatever the policy.
///
/// ```
/// use rss_combiner::util::{validate_url, HostPolicy};
///
/// assert!(validate_url("https://example.com/feed.xml", HostPolicy::PublicOnly).is_ok());
/// assert!(validate_url("http://localhost/feed", HostPolicy::PublicOnly).is_err());
/// assert!(validate_url("http://localhost/feed", HostPolicy::AllowPrivate).is_ok());
/// assert!(validate_url("file:///etc/passwd", HostPolicy::AllowPrivate).is_err());
/// ```
pub fn validate_url(url_str: &str, policy: HostPolicy) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlValidationError::Scheme(url.scheme().to_owned()));
    }

    let kind = url.host().map_or(HostKind::Public, |host| classify(&host));
    if !policy.permits(kind) {
        return Err(UrlValidationError::NonPublicHost {
            host: url.host_str().unwrap_or_default().to_owned(),
            kind,
        });
    }

    Ok(url)
}

fn classify(host: &Host<&str>) -> HostKind {
    let ip = match host {
        Host::Domain(name) if name.eq_ignore_ascii_case("localhost") => {
            return HostKind::Loopback
        }
        Host::Domain(_) => return HostKind::Public,
        Host::Ipv4(v4) => IpAddr::V4(*v4),
        Host::Ipv6(v6) => IpAddr::V6(*v6),
    };

    if ip.is_loopback() {
        return HostKind::Loopback;
    }
    let private = match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        // fc00::/7 unique local, fe80::/10 link-local
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_unspecified() || first & 0xfe00 == 0xfc00 || first & 0xffc0 == 0xfe80
        }
    };
    if private {
        HostKind::Private
    } else {
        HostKind::Public
    }
}
