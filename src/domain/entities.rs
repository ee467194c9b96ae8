//! Domain entities: core data structures

use std::fmt;

use chrono::{DateTime, Utc};
use url::Url;

use crate::domain::arena::NodeId;

/// Display name used for folders that carry no title.
pub const UNTITLED_FOLDER: &str = "Untitled";

/// Folder payload: a named, ordered grouping of bookmarks and subfolders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub name: String,
}

impl Folder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Bookmark payload: a leaf record pointing at a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    /// Display title (falls back to the url when the store has none)
    pub title: String,
    pub url: String,
    /// Lower-cased host of `url`, None when the url has no host
    pub domain: Option<String>,
    /// Safari's `WebBookmarkUUID`, if present
    pub uuid: Option<String>,
    pub added_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Bookmark {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let domain = derive_domain(&url);
        Self {
            title: title.into(),
            url,
            domain,
            uuid: None,
            added_at: None,
            modified_at: None,
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_timestamps(
        mut self,
        added_at: Option<DateTime<Utc>>,
        modified_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.added_at = added_at;
        self.modified_at = modified_at;
        self
    }

    /// Text searched by keyword filters: title and url joined by a space.
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.url).to_lowercase()
    }

    pub fn domain_str(&self) -> &str {
        self.domain.as_deref().unwrap_or("")
    }
}

/// Derive the lower-cased host of a url.
///
/// Returns None for urls that do not parse or have no host
/// (e.g. `javascript:` bookmarklets).
pub fn derive_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.trim_end_matches('.').to_lowercase();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Classified reason a liveness probe did not produce a usable answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Connection could not be established
    NetworkUnreachable,
    /// Connection dropped by the peer mid-request
    ConnectionReset,
    Timeout,
    DnsFailure,
    TooManyRedirects,
    /// Unparsable url or unsupported scheme
    MalformedUrl,
    /// Server answered with a status at or above the threshold
    HttpStatus(u16),
}

impl FailureKind {
    /// Transient failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureKind::Timeout | FailureKind::ConnectionReset | FailureKind::NetworkUnreachable
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::NetworkUnreachable => write!(f, "network-unreachable"),
            FailureKind::ConnectionReset => write!(f, "connection-reset"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::DnsFailure => write!(f, "dns-failure"),
            FailureKind::TooManyRedirects => write!(f, "too-many-redirects"),
            FailureKind::MalformedUrl => write!(f, "malformed-url"),
            FailureKind::HttpStatus(code) => write!(f, "http-status-{}", code),
        }
    }
}

/// Raw outcome of probing a url: the server's status, or why there was none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Status(u16),
    Failed(FailureKind),
}

/// Result of probing one bookmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub id: NodeId,
    pub outcome: ProbeOutcome,
    /// Number of requests issued (>= 1)
    pub attempts: u32,
    pub checked_at: DateTime<Utc>,
}

impl ProbeResult {
    pub fn new(id: NodeId, outcome: ProbeOutcome, attempts: u32) -> Self {
        Self {
            id,
            outcome,
            attempts,
            checked_at: Utc::now(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self.outcome {
            ProbeOutcome::Status(code) => Some(code),
            ProbeOutcome::Failed(_) => None,
        }
    }

    /// Failure classification relative to `threshold`.
    ///
    /// A status below the threshold is a success and yields None.
    pub fn failure(&self, threshold: u16) -> Option<FailureKind> {
        match self.outcome {
            ProbeOutcome::Failed(kind) => Some(kind),
            ProbeOutcome::Status(code) if code >= threshold => Some(FailureKind::HttpStatus(code)),
            ProbeOutcome::Status(_) => None,
        }
    }

    pub fn is_alive(&self, threshold: u16) -> bool {
        self.failure(threshold).is_none()
    }
}

/// Human readable status text, matching the classic link-checker buckets.
pub fn describe_status(code: u16) -> &'static str {
    match code {
        200..=299 => "OK",
        300..=399 => "Redirect",
        400..=499 => "Client error",
        500..=599 => "Server error",
        _ => "Unknown",
    }
}

/// Expand environment variables and tilde in a path string.
///
/// Supports `$VAR`, `${VAR}`, and `~`.
/// Returns the original string if expansion fails.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_url_with_mixed_case_host_when_deriving_domain_then_lowercases() {
        assert_eq!(
            derive_domain("https://Docs.Laravel.COM/10.x/routing"),
            Some("docs.laravel.com".to_string())
        );
    }

    #[test]
    fn given_url_with_port_when_deriving_domain_then_strips_port() {
        assert_eq!(
            derive_domain("http://localhost:8080/admin"),
            Some("localhost".to_string())
        );
    }

    #[test]
    fn given_bookmarklet_when_deriving_domain_then_none() {
        assert_eq!(derive_domain("javascript:alert(1)"), None);
        assert_eq!(derive_domain("not a url"), None);
    }

    #[test]
    fn given_transient_kinds_when_checking_then_only_network_kinds_are_retryable() {
        assert!(FailureKind::Timeout.is_transient());
        assert!(FailureKind::ConnectionReset.is_transient());
        assert!(FailureKind::NetworkUnreachable.is_transient());
        assert!(!FailureKind::DnsFailure.is_transient());
        assert!(!FailureKind::MalformedUrl.is_transient());
        assert!(!FailureKind::TooManyRedirects.is_transient());
        assert!(!FailureKind::HttpStatus(503).is_transient());
    }
}
