//! EventFeed trait and the HTTP implementation

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::debug;

use super::{Event, FeedError, decode_events};

/// Source of recent repository events
///
/// Implementations return one page of events, newest first, exactly as the
/// feed serves them. Filtering and ordering are the relay's job.
#[async_trait]
pub trait EventFeed: Send + Sync {
    /// Fetch the most recent page of events
    async fn fetch_recent(&self) -> Result<Vec<Event>, FeedError>;
}

/// Repository events endpoint reached over HTTPS with a bearer token
pub struct GithubFeed {
    http: Client,
    url: String,
    per_page: u32,
}

impl GithubFeed {
    /// Create a feed client
    ///
    /// The timeout applies to every request; the feed endpoint itself has no
    /// upper bound on how long it may take to answer.
    pub fn new(url: impl Into<String>, token: &str, per_page: u32, timeout: Duration) -> Result<Self, FeedError> {
        let url = url.into();
        debug!(%url, per_page, ?timeout, "GithubFeed::new: called");

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        let mut auth =
            HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| FeedError::InvalidToken(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = Client::builder()
            .user_agent(concat!("pushrelay/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { http, url, per_page })
    }

    /// URL being polled (without query)
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventFeed for GithubFeed {
    async fn fetch_recent(&self) -> Result<Vec<Event>, FeedError> {
        debug!(url = %self.url, "fetch_recent: called");
        let response = self
            .http
            .get(&self.url)
            .query(&[("per_page", self.per_page)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("").to_string();
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() { reason } else { format!("{} - {}", reason, body) };
            return Err(FeedError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let events = decode_events(&body)?;
        debug!(count = events.len(), "fetch_recent: received events");
        Ok(events)
    }
}
