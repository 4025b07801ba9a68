//! newsrelay - relay an RSS feed to a Telegram chat.
//!
//! New feed entries are stored once, held back for a configurable pause, and
//! then posted with a shortened link.

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod http;
pub mod logging;
pub mod news;
pub mod reconciler;
pub mod shortener;
pub mod telegram;

pub use app::{App, Command, RelayApp, RunReport};
pub use config::Config;
pub use db::{Database, DbPool};
pub use error::{RelayError, Result};
pub use feed::{FeedSource, RssSource};
pub use news::{NewsItem, NewsRepository};
pub use reconciler::{DetectReport, PublishReport, ReconcileSettings, Reconciler};
pub use shortener::{Bitly, LinkShortener};
pub use telegram::{Publisher, SentMessage, TelegramBot};
