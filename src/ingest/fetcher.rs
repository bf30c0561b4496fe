//! HTTP page fetcher
//!
//! This module handles all requests against the reply endpoint, including:
//! - Building the HTTP client with a descriptive user agent string
//! - Fetching one page per request
//! - Decoding the JSON envelope into a `Page`
//! - Classifying failures (status, transport, payload, source error code)
//!
//! Every failure is fatal for the run; there is no retry.

use crate::config::UserAgentConfig;
use crate::model::wire::Envelope;
use crate::model::Page;
use crate::HarvestError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Anything that can produce pages of a discussion by index
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches a single page
    ///
    /// # Returns
    ///
    /// * `Ok(Page::Replies(_))` - The page has data
    /// * `Ok(Page::Empty)` - No data at this index or beyond
    /// * `Err(HarvestError)` - Transport or payload failure
    async fn fetch_page(&self, page: u32) -> Result<Page, HarvestError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use reply_harvest::config::UserAgentConfig;
/// use reply_harvest::ingest::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "reply-harvest".to_string(),
///     crawler_version: "0.1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Format: Name/Version (+ContactURL)
    let user_agent = format!(
        "{}/{} (+{})",
        config.crawler_name, config.crawler_version, config.contact_url
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Page source backed by the HTTP reply endpoint
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: Client,
    endpoint: String,
}

impl HttpPageSource {
    /// # Arguments
    ///
    /// * `client` - The HTTP client to use
    /// * `endpoint` - URL prefix the page index is appended to
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Full URL of a page
    pub fn page_url(&self, page: u32) -> String {
        format!("{}{}", self.endpoint, page)
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(&self, page: u32) -> Result<Page, HarvestError> {
        let url = self.page_url(page);
        tracing::debug!("Fetching page {}: {}", page, url);

        let body = get_text(&self.client, &url).await?;
        decode_page(&url, &body)
    }
}

/// GETs `url` and returns its body
///
/// Non-success statuses become `Transport` errors, and anything the client
/// itself rejects becomes `Http`.
pub(crate) async fn get_text(client: &Client, url: &str) -> Result<String, HarvestError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| HarvestError::Http {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(HarvestError::Transport {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(|source| HarvestError::Http {
        url: url.to_string(),
        source,
    })
}

/// Decodes a response body into a page
pub fn decode_page(url: &str, body: &str) -> Result<Page, HarvestError> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|source| HarvestError::Decode {
        url: url.to_string(),
        source,
    })?;

    if envelope.code != 0 {
        return Err(HarvestError::Api {
            url: url.to_string(),
            code: envelope.code,
            message: envelope.message,
        });
    }

    Ok(Page::from_envelope(envelope))
}
