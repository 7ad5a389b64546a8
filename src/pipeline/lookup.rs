//! Network collaborators of the fetch chain: archive snapshot lookup and the
//! optional reachability probe.
//!
//! Neither ever fails the record: every transport, HTTP or decoding error
//! is logged and mapped to "no snapshot" / "unreachable" so the chain can
//! move on to its next strategy.

use crate::error::ArchiveError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("pocket2pdf/", env!("CARGO_PKG_VERSION"));

/// Finds an archived copy of a page.
#[async_trait]
pub trait SnapshotLookup: Send + Sync {
    /// Url of the most recent available snapshot, or `None` when there is
    /// none or the lookup failed.
    async fn latest_snapshot(&self, url: &str) -> Option<String>;
}

/// Decides whether a url is worth handing to the renderer at all.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn is_reachable(&self, url: &str) -> bool;
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, ArchiveError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ArchiveError::HttpClient(e.to_string()))
}

// ── Wayback Machine ──────────────────────────────────────────────────────

/// Queries the Wayback Machine availability API
/// (`GET <endpoint>?url=<url>`).
#[derive(Debug, Clone)]
pub struct WaybackLookup {
    client: reqwest::Client,
    endpoint: String,
}

impl WaybackLookup {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ArchiveError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SnapshotLookup for WaybackLookup {
    async fn latest_snapshot(&self, url: &str) -> Option<String> {
        let response = match self
            .client
            .get(&self.endpoint)
            .query(&[("url", url)])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Wayback API error for {}: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("Wayback API returned HTTP {} for {}", response.status(), url);
            return None;
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                warn!("Wayback API body unreadable for {}: {}", url, e);
                return None;
            }
        };

        let snapshot = parse_availability(&body);
        debug!("Wayback lookup for {} → {:?}", url, snapshot);
        snapshot
    }
}

#[derive(Debug, Deserialize)]
struct AvailabilityResponse {
    #[serde(default)]
    archived_snapshots: ArchivedSnapshots,
}

#[derive(Debug, Default, Deserialize)]
struct ArchivedSnapshots {
    closest: Option<Snapshot>,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    url: String,
    #[serde(default = "default_available")]
    available: bool,
}

fn default_available() -> bool {
    true
}

/// Extract the closest snapshot url from an availability API response.
///
/// ```json
/// {"archived_snapshots": {"closest": {"available": true, "url": "http://web.archive.org/web/2020.../https://a.example/"}}}
/// ```
pub fn parse_availability(body: &str) -> Option<String> {
    let parsed: AvailabilityResponse = match serde_json::from_str(body) {
        Ok(p) => p,
        Err(e) => {
            warn!("Unexpected Wayback API response: {}", e);
            return None;
        }
    };
    parsed
        .archived_snapshots
        .closest
        .filter(|s| s.available && !s.url.trim().is_empty())
        .map(|s| s.url.trim().to_string())
}

// ── Reachability probe ───────────────────────────────────────────────────

/// `GET`s the url and accepts any final status in 200–399.
///
/// Some servers mishandle `HEAD`, so a real `GET` is sent; the body is
/// never read.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, ArchiveError> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn is_reachable(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                debug!("Probe {} → HTTP {}", url, code);
                (200..400).contains(&code)
            }
            Err(e) => {
                debug!("Probe {} failed: {}", url, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_with_snapshot() {
        let body = r#"{"url":"example.com","archived_snapshots":{"closest":{"status":"200","available":true,"url":"http://web.archive.org/web/20240101000000/https://example.com/","timestamp":"20240101000000"}}}"#;
        assert_eq!(
            parse_availability(body).as_deref(),
            Some("http://web.archive.org/web/20240101000000/https://example.com/")
        );
    }

    #[test]
    fn availability_without_snapshot() {
        assert_eq!(parse_availability(r#"{"url":"x","archived_snapshots":{}}"#), None);
        assert_eq!(parse_availability(r#"{"url":"x"}"#), None);
    }

    #[test]
    fn availability_marked_unavailable() {
        let body = r#"{"archived_snapshots":{"closest":{"available":false,"url":"http://web.archive.org/web/1/x"}}}"#;
        assert_eq!(parse_availability(body), None);
    }

    #[test]
    fn availability_garbage() {
        assert_eq!(parse_availability("<html>rate limited</html>"), None);
    }

    #[tokio::test]
    async fn lookup_transport_error_is_none() {
        // Port 9 (discard) is closed on any sane test host.
        let lookup = WaybackLookup::new("http://127.0.0.1:9/wayback/available", Duration::from_secs(2)).unwrap();
        assert_eq!(lookup.latest_snapshot("https://a.example/").await, None);
    }

    #[tokio::test]
    async fn probe_transport_error_is_unreachable() {
        let probe = HttpProbe::new(Duration::from_secs(2)).unwrap();
        assert!(!probe.is_reachable("http://127.0.0.1:9/").await);
    }
}
