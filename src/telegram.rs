//! Telegram Bot API publisher.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{HttpConfig, TelegramConfig};
use crate::http::build_client;
use crate::{RelayError, Result};

/// Identifiers of a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: i64,
    pub message_id: i64,
}

/// Destination for relayed messages.
#[allow(async_fn_in_trait)]
pub trait Publisher {
    /// Send `text` (HTML formatted) and return the delivered message's IDs.
    async fn send(&self, text: &str) -> Result<SentMessage>;
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    result: Option<MessageResult>,
    error_code: Option<i64>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResult {
    message_id: i64,
    chat: ChatResult,
}

#[derive(Debug, Deserialize)]
struct ChatResult {
    id: i64,
}

/// Bot posting to a single configured chat.
pub struct TelegramBot {
    client: Client,
    api_url: String,
    access_token: String,
    chat: String,
}

impl TelegramBot {
    /// Create a bot from configuration.
    pub fn new(config: &TelegramConfig, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(http)?,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            chat: config.chat.clone(),
        })
    }

    /// The destination chat.
    pub fn chat(&self) -> &str {
        &self.chat
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.access_token, method)
    }
}

impl Publisher for TelegramBot {
    async fn send(&self, text: &str) -> Result<SentMessage> {
        let request = SendMessageRequest {
            chat_id: &self.chat,
            text,
            parse_mode: "HTML",
        };

        // The request URL embeds the token, keep it out of error messages.
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::Post(format!("request failed: {}", e.without_url())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Post(format!("failed to read response: {}", e.without_url())))?;

        parse_send_response(&body).map_err(|e| match e {
            RelayError::Post(msg) if !status.is_success() => {
                RelayError::Post(format!("HTTP {}: {}", status, msg))
            }
            other => other,
        })
    }
}

/// Parse a `sendMessage` response body.
pub fn parse_send_response(body: &str) -> Result<SentMessage> {
    let response: ApiResponse = serde_json::from_str(body)
        .map_err(|e| RelayError::Post(format!("malformed response: {}", e)))?;

    if !response.ok {
        return Err(RelayError::Post(format!(
            "API error {}: {}",
            response.error_code.unwrap_or_default(),
            response
                .description
                .as_deref()
                .unwrap_or("no description")
        )));
    }

    let result = response
        .result
        .ok_or_else(|| RelayError::Post("response has no result".to_string()))?;

    Ok(SentMessage {
        chat_id: result.chat.id,
        message_id: result.message_id,
    })
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
