//! Application context.
//!
//! [`App`] is built once at startup and owns everything a run needs. Every
//! run holds the database lease for its duration, renewing it before each
//! post, so overlapping scheduler invocations cannot detect or post the same
//! item twice.

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::db::{Database, RunLease, RunLockRepository};
use crate::feed::{FeedSource, RssSource};
use crate::reconciler::{DetectReport, PublishReport, ReconcileSettings, Reconciler};
use crate::shortener::{Bitly, LinkShortener};
use crate::telegram::{Publisher, TelegramBot};
use crate::{RelayError, Result};

/// Name of the lease shared by all commands.
pub const LOCK_NAME: &str = "newsrelay";

/// Smallest accepted lease threshold in seconds.
pub const MIN_LOCK_STALE_AFTER: u64 = 1;

/// Operation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Detect,
    Publish,
    /// Detect, then publish.
    Run,
}

/// Result of one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub detect: Option<DetectReport>,
    pub publish: Option<PublishReport>,
}

/// Production wiring: RSS over HTTP, Bitly, Telegram.
pub type RelayApp = App<RssSource, Bitly, TelegramBot>;

/// Application context.
pub struct App<F, S, P> {
    reconciler: Reconciler<F, S, P>,
    lock_stale_after: i64,
    lease: RunLease,
}

impl RelayApp {
    /// Validate the configuration and build the production context.
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let db = Database::open(&config.database.path).await?;
        let feed = RssSource::new(&config.rss.link, &config.http)?;
        let shortener = Bitly::new(&config.bitly, &config.http)?;
        if !shortener.is_enabled() {
            debug!("Bitly access token not set, links will not be shortened");
        }
        let publisher = TelegramBot::new(&config.telegram, &config.http)?;
        let settings = ReconcileSettings::from_params(&config.export_params);

        Ok(App::new(
            Reconciler::new(db, feed, shortener, publisher, settings),
            config.export_params.lock_stale_after,
        ))
    }
}

impl<F, S, P> App<F, S, P>
where
    F: FeedSource,
    S: LinkShortener,
    P: Publisher,
{
    /// Create a context whose lease goes stale after `lock_stale_after`
    /// seconds without renewal (at least [`MIN_LOCK_STALE_AFTER`]).
    pub fn new(reconciler: Reconciler<F, S, P>, lock_stale_after: u64) -> Self {
        let holder = format!(
            "{}-{}",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );
        let lock_stale_after = lock_stale_after.max(MIN_LOCK_STALE_AFTER);
        Self {
            reconciler,
            lock_stale_after: i64::try_from(lock_stale_after).unwrap_or(i64::MAX),
            lease: RunLease::new(LOCK_NAME, holder),
        }
    }

    pub fn reconciler(&self) -> &Reconciler<F, S, P> {
        &self.reconciler
    }

    /// The lease this context takes for each run.
    pub fn lease(&self) -> &RunLease {
        &self.lease
    }

    /// Run `command` while holding the lease.
    ///
    /// Fails with [`RelayError::Locked`] without doing anything if another
    /// run holds a fresh lease. The lease is released even if the command
    /// fails.
    pub async fn run(&self, command: Command) -> Result<RunReport> {
        let locks = RunLockRepository::new(self.reconciler.database().pool());

        let acquired = locks
            .try_acquire(
                &self.lease.name,
                &self.lease.holder,
                Utc::now().timestamp(),
                self.lock_stale_after,
            )
            .await?;
        if !acquired {
            return Err(RelayError::Locked(format!(
                "another {} run is in progress",
                LOCK_NAME
            )));
        }

        let result = self.execute(command).await;

        match locks.release(&self.lease.name, &self.lease.holder).await {
            Ok(true) => {}
            Ok(false) => warn!("Run lease was taken over before release"),
            Err(e) => warn!("Failed to release run lease: {}", e),
        }

        result
    }

    async fn execute(&self, command: Command) -> Result<RunReport> {
        let mut report = RunReport::default();
        if matches!(command, Command::Detect | Command::Run) {
            report.detect = Some(self.reconciler.detect().await?);
        }
        if matches!(command, Command::Publish | Command::Run) {
            report.publish = Some(self.reconciler.publish_leased(&self.lease).await?);
        }
        Ok(report)
    }
}
