//! Shared HTTP client construction.

use std::time::Duration;

use reqwest::Client;

use crate::config::HttpConfig;
use crate::{RelayError, Result};

/// User agent string for outbound requests.
pub const USER_AGENT: &str = concat!("newsrelay/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Build a client with the configured timeouts.
pub fn build_client(config: &HttpConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| RelayError::Config(format!("failed to create HTTP client: {}", e)))
}
