//! Test helpers for reconciliation tests.
//!
//! Provides in-memory fakes for the feed, shortener and publisher. Each fake
//! is a cheap handle around shared state so a test can change the feed or
//! inspect sent messages after the reconciler has taken ownership.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use newsrelay::{
    Database, FeedSource, LinkShortener, NewsItem, Publisher, ReconcileSettings, Reconciler,
    RelayError, Result, SentMessage,
};

/// Chat ID reported by [`FakePublisher`].
pub const CHAT_ID: i64 = -1001234567890;

/// First message ID handed out by [`FakePublisher`].
pub const FIRST_MESSAGE_ID: i64 = 1000;

#[derive(Default)]
struct FeedState {
    entries: Vec<NewsItem>,
    fail: bool,
    fetches: usize,
}

/// Feed returning whatever entries the test sets.
#[derive(Clone, Default)]
pub struct FakeFeed {
    state: Arc<Mutex<FeedState>>,
}

impl FakeFeed {
    pub fn new(entries: Vec<NewsItem>) -> Self {
        let feed = Self::default();
        feed.set(entries);
        feed
    }

    pub fn set(&self, entries: Vec<NewsItem>) {
        self.state.lock().unwrap().entries = entries;
    }

    pub fn set_failing(&self, fail: bool) {
        self.state.lock().unwrap().fail = fail;
    }

    pub fn fetches(&self) -> usize {
        self.state.lock().unwrap().fetches
    }
}

impl FeedSource for FakeFeed {
    async fn fetch(&self) -> Result<Vec<NewsItem>> {
        let mut state = self.state.lock().unwrap();
        state.fetches += 1;
        if state.fail {
            return Err(RelayError::Fetch("HTTP error: 503 Service Unavailable".to_string()));
        }
        Ok(state.entries.clone())
    }
}

/// Shortener mapping every link to `https://sho.rt/<n>`.
#[derive(Clone, Default)]
pub struct FakeShortener {
    shortened: Arc<Mutex<Vec<String>>>,
}

impl FakeShortener {
    pub fn shortened(&self) -> Vec<String> {
        self.shortened.lock().unwrap().clone()
    }
}

impl LinkShortener for FakeShortener {
    async fn shorten(&self, url: &str) -> String {
        let mut shortened = self.shortened.lock().unwrap();
        shortened.push(url.to_string());
        format!("https://sho.rt/{}", shortened.len())
    }
}

/// Shortener returning links unchanged.
#[derive(Clone, Default)]
pub struct IdentityShortener;

impl LinkShortener for IdentityShortener {
    async fn shorten(&self, url: &str) -> String {
        url.to_string()
    }
}

#[derive(Default)]
struct PublisherState {
    sent: Vec<String>,
    fail_containing: Vec<String>,
    attempts: usize,
}

/// Publisher recording sent texts.
///
/// Sending fails for any text containing one of the configured needles.
#[derive(Clone, Default)]
pub struct FakePublisher {
    state: Arc<Mutex<PublisherState>>,
}

impl FakePublisher {
    pub fn fail_on(&self, needle: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_containing
            .push(needle.to_string());
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().fail_containing.clear();
    }

    pub fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts
    }
}

impl Publisher for FakePublisher {
    async fn send(&self, text: &str) -> Result<SentMessage> {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;
        if state.fail_containing.iter().any(|n| text.contains(n)) {
            return Err(RelayError::Post(
                "API error 400: Bad Request: message is too long".to_string(),
            ));
        }
        state.sent.push(text.to_string());
        Ok(SentMessage {
            chat_id: CHAT_ID,
            message_id: FIRST_MESSAGE_ID + state.sent.len() as i64 - 1,
        })
    }
}

/// Settings with no pause before publication and no delay between messages.
pub fn immediate_settings() -> ReconcileSettings {
    ReconcileSettings {
        pub_pause: 0,
        delay_between_messages: std::time::Duration::ZERO,
        ..ReconcileSettings::default()
    }
}

/// Build a reconciler over a fresh in-memory database.
pub async fn reconciler<S: LinkShortener>(
    feed: &FakeFeed,
    shortener: S,
    publisher: &FakePublisher,
    settings: ReconcileSettings,
) -> Reconciler<FakeFeed, S, FakePublisher> {
    let db = Database::open_in_memory().await.unwrap();
    Reconciler::new(db, feed.clone(), shortener, publisher.clone(), settings)
}

/// Shorthand for a feed entry.
pub fn entry(text: &str, link: &str) -> NewsItem {
    NewsItem::new(text, link, 1_700_000_000)
}

/// Current UNIX time in seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
