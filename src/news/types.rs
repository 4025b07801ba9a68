//! News item types for newsrelay.

use std::hash::{Hash, Hasher};

/// Title used for feed entries that carry none.
pub const UNTITLED: &str = "Untitled";

/// A news item, either freshly parsed from the feed or read back from the store.
///
/// Two items are equal when their `text` and `link` match; timestamps and
/// posting state are ignored. This is the identity used to match stored
/// items against the live feed.
#[derive(Debug, Clone)]
pub struct NewsItem {
    /// Row ID (0 until stored).
    pub id: i64,
    /// Entry title, sent as the message body.
    pub text: String,
    /// Entry URL. Unique among stored items.
    pub link: String,
    /// When the entry was published, UNIX seconds.
    pub discovered_at: i64,
    /// Earliest publication time, UNIX seconds (0 until detected).
    pub publish_at: i64,
    /// Chat the item was posted to.
    pub chat_id: i64,
    /// Message ID of the post (0 until posted).
    pub message_id: i64,
}

impl NewsItem {
    /// Create an unsaved, unscheduled item.
    pub fn new(text: impl Into<String>, link: impl Into<String>, discovered_at: i64) -> Self {
        Self {
            id: 0,
            text: text.into(),
            link: link.into(),
            discovered_at,
            publish_at: 0,
            chat_id: 0,
            message_id: 0,
        }
    }

    /// Set the publication time.
    pub fn with_publish_at(mut self, publish_at: i64) -> Self {
        self.publish_at = publish_at;
        self
    }

    /// Check if the item has been posted.
    pub fn is_posted(&self) -> bool {
        self.message_id != 0
    }

    /// Check if the item is unposted and its publication time has passed.
    pub fn is_due(&self, now: i64) -> bool {
        !self.is_posted() && self.publish_at <= now
    }

    /// Identity key: `(text, link)`.
    pub fn key(&self) -> (&str, &str) {
        (&self.text, &self.link)
    }
}

impl PartialEq for NewsItem {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for NewsItem {}

impl Hash for NewsItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl std::fmt::Display for NewsItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' <{}> publish_at={}", self.text, self.link, self.publish_at)
    }
}
