//! RSS/Atom feed fetcher.

use chrono::Utc;
use feed_rs::parser;
use reqwest::Client;
use tracing::debug;

use super::FeedSource;
use crate::config::HttpConfig;
use crate::error::{RelayError, Result};
use crate::http::build_client;
use crate::news::{NewsItem, UNTITLED};

/// Maximum feed size in bytes (5MB).
pub const MAX_FEED_SIZE: u64 = 5 * 1024 * 1024;

/// Feed source reading a single RSS/Atom URL over HTTP.
pub struct RssSource {
    client: Client,
    url: String,
}

impl RssSource {
    /// Create a source for `url`.
    pub fn new(url: impl Into<String>, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(http)?,
            url: url.into(),
        })
    }

    /// The feed URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_bytes(&self) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| RelayError::Fetch(format!("failed to fetch feed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RelayError::Fetch(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_FEED_SIZE {
                return Err(RelayError::Fetch(format!(
                    "feed too large: {} bytes (max {} bytes)",
                    content_length, MAX_FEED_SIZE
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RelayError::Fetch(format!("failed to read response: {}", e)))?;

        if bytes.len() as u64 > MAX_FEED_SIZE {
            return Err(RelayError::Fetch(format!(
                "feed too large: {} bytes (max {} bytes)",
                bytes.len(),
                MAX_FEED_SIZE
            )));
        }

        Ok(bytes.to_vec())
    }
}

impl FeedSource for RssSource {
    async fn fetch(&self) -> Result<Vec<NewsItem>> {
        debug!("Fetching feed {}", self.url);
        let bytes = self.fetch_bytes().await?;
        let items = parse_feed(&bytes, Utc::now().timestamp())?;
        debug!("Feed {} returned {} item(s)", self.url, items.len());
        Ok(items)
    }
}

/// Parse feed bytes into news items, in feed order.
///
/// Entries without a link are skipped. The entry's published time is used as
/// the discovery time, falling back to its updated time and then `fetched_at`.
pub fn parse_feed(bytes: &[u8], fetched_at: i64) -> Result<Vec<NewsItem>> {
    let feed = parser::parse(bytes)
        .map_err(|e| RelayError::Fetch(format!("failed to parse feed: {}", e)))?;

    let items = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let Some(link) = entry.links.first().map(|l| l.href.clone()) else {
                debug!("Skipping feed entry {} without a link", entry.id);
                return None;
            };
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| UNTITLED.to_string());
            let discovered_at = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.timestamp())
                .unwrap_or(fetched_at);

            Some(NewsItem::new(title, link, discovered_at))
        })
        .collect();

    Ok(items)
}
