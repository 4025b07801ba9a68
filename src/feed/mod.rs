//! Feed sources.
//!
//! A [`FeedSource`] yields the current entries of the relayed feed as
//! unscheduled [`NewsItem`]s, in feed order.

pub mod fetcher;

pub use fetcher::{parse_feed, RssSource, MAX_FEED_SIZE};

use crate::news::NewsItem;
use crate::Result;

/// Source of the current feed entries.
#[allow(async_fn_in_trait)]
pub trait FeedSource {
    /// Fetch and normalize all current entries.
    ///
    /// A feed-level failure is returned as [`crate::RelayError::Fetch`];
    /// individual malformed entries are skipped.
    async fn fetch(&self) -> Result<Vec<NewsItem>>;
}
