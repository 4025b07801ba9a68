//! Link shortening.
//!
//! Shortening is best effort: a [`LinkShortener`] returns the original URL
//! whenever the service cannot produce a short one.

use reqwest::Client;
use tracing::{debug, warn};

use crate::config::{BitlyConfig, HttpConfig};
use crate::http::build_client;
use crate::{RelayError, Result};

/// Best-effort URL shortener.
#[allow(async_fn_in_trait)]
pub trait LinkShortener {
    /// Return a short form of `url`, or `url` itself on any failure.
    async fn shorten(&self, url: &str) -> String;
}

/// Client for the Bitly v3 shorten API.
///
/// With an empty access token every link is passed through unchanged.
pub struct Bitly {
    client: Client,
    access_token: String,
    api_url: String,
}

impl Bitly {
    /// Create a client from configuration.
    pub fn new(config: &BitlyConfig, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(http)?,
            access_token: config.access_token.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Check whether an access token is configured.
    pub fn is_enabled(&self) -> bool {
        !self.access_token.is_empty()
    }

    fn request_url(&self, long_url: &str) -> String {
        format!(
            "{}/v3/shorten?access_token={}&longUrl={}&format=json",
            self.api_url,
            urlencoding::encode(&self.access_token),
            urlencoding::encode(long_url)
        )
    }

    async fn try_shorten(&self, long_url: &str) -> Result<String> {
        let response = self
            .client
            .get(self.request_url(long_url))
            .send()
            .await
            .map_err(|e| RelayError::Shorten(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RelayError::Shorten(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Shorten(format!("failed to read response: {}", e)))?;

        parse_shorten_response(&body)
    }
}

impl LinkShortener for Bitly {
    async fn shorten(&self, url: &str) -> String {
        if !self.is_enabled() {
            return url.to_string();
        }

        match self.try_shorten(url).await {
            Ok(short) => {
                debug!("Shortened {} to {}", url, short);
                short
            }
            Err(e) => {
                warn!("Using original link {}: {}", url, e);
                url.to_string()
            }
        }
    }
}

/// Extract `data.url` from a Bitly v3 shorten response body.
pub fn parse_shorten_response(body: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| RelayError::Shorten(format!("malformed response: {}", e)))?;

    if let Some(code) = value.get("status_code").and_then(|c| c.as_i64()) {
        if code != 200 {
            let reason = value
                .get("status_txt")
                .and_then(|t| t.as_str())
                .unwrap_or("unknown error");
            return Err(RelayError::Shorten(format!(
                "service error {}: {}",
                code, reason
            )));
        }
    }

    value
        .get("data")
        .and_then(|d| d.get("url"))
        .and_then(|u| u.as_str())
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .ok_or_else(|| RelayError::Shorten("response has no data.url".to_string()))
}
