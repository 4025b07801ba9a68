//! Detect/publish reconciliation.
//!
//! Each stored item moves through `unseen → pending → due → posted`:
//! [`Reconciler::detect`] stores unseen feed entries with a delayed
//! publication time, and [`Reconciler::publish`] posts due items that are
//! still present in the live feed.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::{ExportParams, OnPostError, PublishOrder};
use crate::db::{Database, RunLease, RunLockRepository};
use crate::feed::FeedSource;
use crate::news::{NewsItem, NewsRepository};
use crate::shortener::LinkShortener;
use crate::telegram::{escape_html, Publisher, SentMessage};
use crate::{RelayError, Result};

/// Tunables for detect and publish.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Seconds between detection and earliest publication.
    pub pub_pause: i64,
    /// Pause between two sent messages.
    pub delay_between_messages: Duration,
    pub on_post_error: OnPostError,
    pub publish_order: PublishOrder,
}

impl ReconcileSettings {
    /// Build settings from the export parameters.
    pub fn from_params(params: &ExportParams) -> Self {
        Self {
            pub_pause: i64::try_from(params.pub_pause).unwrap_or(i64::MAX),
            delay_between_messages: Duration::from_secs(params.delay_between_messages),
            on_post_error: params.on_post_error,
            publish_order: params.publish_order,
        }
    }
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self::from_params(&ExportParams::default())
    }
}

/// Outcome of a detect run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectReport {
    /// Entries returned by the feed.
    pub fetched: usize,
    /// Entries stored as new items.
    pub inserted: usize,
}

/// Outcome of a publish run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Items due for publication.
    pub due: usize,
    /// Due items still present in the live feed.
    pub matched: usize,
    /// Items posted and recorded.
    pub posted: usize,
    /// Items whose post failed; they stay due.
    pub failed: usize,
}

/// Reconciler context: the store plus the external collaborators.
pub struct Reconciler<F, S, P> {
    db: Database,
    feed: F,
    shortener: S,
    publisher: P,
    settings: ReconcileSettings,
}

impl<F, S, P> Reconciler<F, S, P>
where
    F: FeedSource,
    S: LinkShortener,
    P: Publisher,
{
    pub fn new(
        db: Database,
        feed: F,
        shortener: S,
        publisher: P,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            db,
            feed,
            shortener,
            publisher,
            settings,
        }
    }

    /// The underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Store feed entries whose link has not been seen yet.
    ///
    /// Entries are processed oldest first. Each new item gets
    /// `publish_at = now + pub_pause`, with `now` read per item.
    pub async fn detect(&self) -> Result<DetectReport> {
        let repo = NewsRepository::new(self.db.pool());

        let mut entries = self.feed.fetch().await?;
        entries.reverse();

        let mut report = DetectReport {
            fetched: entries.len(),
            inserted: 0,
        };

        for entry in entries {
            if repo.exists(&entry.link).await? {
                continue;
            }

            let publish_at = now().saturating_add(self.settings.pub_pause);
            let item = repo.insert(&entry.with_publish_at(publish_at)).await?;
            info!("Detected news: {}", item);
            report.inserted += 1;
        }

        if report.inserted > 0 {
            info!(
                "Detect: {} new item(s) out of {} fetched",
                report.inserted, report.fetched
            );
        } else {
            debug!("Detect: no new items out of {} fetched", report.fetched);
        }

        Ok(report)
    }

    /// Post due items that are still present in the live feed.
    pub async fn publish(&self) -> Result<PublishReport> {
        self.publish_batch(None).await
    }

    /// Like [`Reconciler::publish`], renewing `lease` before every post.
    ///
    /// Stops with [`RelayError::Locked`] as soon as the lease turns out to be
    /// lost, so a run that outlived its lease never posts alongside the run
    /// that took it over.
    pub async fn publish_leased(&self, lease: &RunLease) -> Result<PublishReport> {
        self.publish_batch(Some(lease)).await
    }

    async fn publish_batch(&self, lease: Option<&RunLease>) -> Result<PublishReport> {
        let repo = NewsRepository::new(self.db.pool());

        let due = repo.due_for_publish(now()).await?;
        let mut report = PublishReport {
            due: due.len(),
            ..PublishReport::default()
        };

        if due.is_empty() {
            debug!("Publish: nothing due");
            return Ok(report);
        }

        let live = self.feed.fetch().await?;
        let mut batch = select_for_publish(due, &live);
        if self.settings.publish_order == PublishOrder::NewestFirst {
            batch.reverse();
        }
        report.matched = batch.len();

        if report.matched < report.due {
            info!(
                "Publish: {} due item(s) no longer in the feed, keeping them pending",
                report.due - report.matched
            );
        }

        for (i, item) in batch.iter().enumerate() {
            if i > 0 && !self.settings.delay_between_messages.is_zero() {
                tokio::time::sleep(self.settings.delay_between_messages).await;
            }

            if let Some(lease) = lease {
                self.renew(lease).await?;
            }

            let sent = match self.post(item).await {
                Ok(sent) => sent,
                Err(e) => match self.settings.on_post_error {
                    OnPostError::Continue => {
                        error!("Failed to publish {}: {}", item, e);
                        report.failed += 1;
                        continue;
                    }
                    OnPostError::Abort => {
                        error!("Failed to publish {}, aborting batch: {}", item, e);
                        return Err(e);
                    }
                },
            };

            if !repo
                .mark_posted(&item.link, sent.chat_id, sent.message_id)
                .await?
            {
                warn!("Posted {} but found no unposted row to update", item);
            }
            info!("Public: {}; message_id={}", item, sent.message_id);
            report.posted += 1;
        }

        info!(
            "Publish: {} posted, {} failed, {} due",
            report.posted, report.failed, report.due
        );

        Ok(report)
    }

    async fn renew(&self, lease: &RunLease) -> Result<()> {
        let locks = RunLockRepository::new(self.db.pool());
        if locks.renew(&lease.name, &lease.holder, now()).await? {
            return Ok(());
        }
        error!("Run lease {} was taken over, stopping publish", lease.name);
        Err(RelayError::Locked(format!(
            "lease {} lost during publish",
            lease.name
        )))
    }

    async fn post(&self, item: &NewsItem) -> Result<SentMessage> {
        let link = self.shortener.shorten(&item.link).await;
        let text = compose_message(&item.text, &link);
        self.publisher.send(&text).await
    }
}

/// Keep the due items present in the live feed, in due-list order.
///
/// Items are matched by `(text, link)`.
pub fn select_for_publish(due: Vec<NewsItem>, live: &[NewsItem]) -> Vec<NewsItem> {
    let live: HashSet<&NewsItem> = live.iter().collect();
    due.into_iter().filter(|item| live.contains(item)).collect()
}

/// Message body: the title followed by the link, escaped for HTML parse mode.
pub fn compose_message(text: &str, link: &str) -> String {
    format!("{} {}", escape_html(text), escape_html(link))
}

fn now() -> i64 {
    Utc::now().timestamp()
}
