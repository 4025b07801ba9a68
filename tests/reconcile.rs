//! Detect/publish reconciliation tests against an in-memory store.

mod common;

use std::time::Duration;

use common::*;
use newsrelay::config::{BitlyConfig, HttpConfig, OnPostError, PublishOrder};
use newsrelay::{Bitly, NewsRepository, ReconcileSettings, RelayError};

#[tokio::test]
async fn test_detect_inserts_unseen_entries_with_delayed_publication() {
    let feed = FakeFeed::new(vec![entry("A", "http://x/1")]);
    let publisher = FakePublisher::default();
    let settings = ReconcileSettings {
        pub_pause: 600,
        ..immediate_settings()
    };
    let reconciler = reconciler(&feed, FakeShortener::default(), &publisher, settings).await;

    let before = now();
    let report = reconciler.detect().await.unwrap();
    let after = now();

    assert_eq!(report.fetched, 1);
    assert_eq!(report.inserted, 1);

    let repo = NewsRepository::new(reconciler.database().pool());
    assert_eq!(repo.count().await.unwrap(), 1);

    let item = repo.get_by_link("http://x/1").await.unwrap().unwrap();
    assert_eq!(item.text, "A");
    assert_eq!(item.message_id, 0);
    assert_eq!(item.discovered_at, 1_700_000_000);
    assert!(item.publish_at >= before + 600);
    assert!(item.publish_at <= after + 600);
}

#[tokio::test]
async fn test_detect_is_idempotent_on_unchanged_feed() {
    let feed = FakeFeed::new(vec![entry("B", "http://x/2"), entry("A", "http://x/1")]);
    let publisher = FakePublisher::default();
    let reconciler =
        reconciler(&feed, FakeShortener::default(), &publisher, immediate_settings()).await;

    assert_eq!(reconciler.detect().await.unwrap().inserted, 2);
    let second = reconciler.detect().await.unwrap();
    assert_eq!(second.fetched, 2);
    assert_eq!(second.inserted, 0);

    let repo = NewsRepository::new(reconciler.database().pool());
    assert_eq!(repo.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_detect_stores_oldest_entry_first() {
    // Feeds list newest first
    let feed = FakeFeed::new(vec![
        entry("C", "http://x/3"),
        entry("B", "http://x/2"),
        entry("A", "http://x/1"),
    ]);
    let publisher = FakePublisher::default();
    let reconciler =
        reconciler(&feed, FakeShortener::default(), &publisher, immediate_settings()).await;

    reconciler.detect().await.unwrap();

    let repo = NewsRepository::new(reconciler.database().pool());
    assert_eq!(repo.get_by_link("http://x/1").await.unwrap().unwrap().id, 1);
    assert_eq!(repo.get_by_link("http://x/2").await.unwrap().unwrap().id, 2);
    assert_eq!(repo.get_by_link("http://x/3").await.unwrap().unwrap().id, 3);
}

#[tokio::test]
async fn test_detect_ignores_known_links() {
    let feed = FakeFeed::new(vec![entry("A", "http://x/1")]);
    let publisher = FakePublisher::default();
    let settings = ReconcileSettings {
        pub_pause: 3600,
        ..immediate_settings()
    };
    let reconciler = reconciler(&feed, FakeShortener::default(), &publisher, settings).await;

    reconciler.detect().await.unwrap();
    let repo = NewsRepository::new(reconciler.database().pool());
    let original = repo.get_by_link("http://x/1").await.unwrap().unwrap();

    // Same link, edited title
    feed.set(vec![entry("A (updated)", "http://x/1")]);
    let report = reconciler.detect().await.unwrap();
    assert_eq!(report.inserted, 0);

    let stored = repo.get_by_link("http://x/1").await.unwrap().unwrap();
    assert_eq!(stored.text, "A");
    assert_eq!(stored.publish_at, original.publish_at);
}

#[tokio::test]
async fn test_detect_handles_duplicate_links_within_one_fetch() {
    let feed = FakeFeed::new(vec![entry("A", "http://x/1"), entry("A", "http://x/1")]);
    let publisher = FakePublisher::default();
    let reconciler =
        reconciler(&feed, FakeShortener::default(), &publisher, immediate_settings()).await;

    let report = reconciler.detect().await.unwrap();
    assert_eq!(report.inserted, 1);
}

#[tokio::test]
async fn test_detect_propagates_fetch_errors() {
    let feed = FakeFeed::default();
    feed.set_failing(true);
    let publisher = FakePublisher::default();
    let reconciler =
        reconciler(&feed, FakeShortener::default(), &publisher, immediate_settings()).await;

    let result = reconciler.detect().await;
    assert!(matches!(result, Err(RelayError::Fetch(_))));
}

#[tokio::test]
async fn test_publish_posts_due_item_and_records_ids() {
    let feed = FakeFeed::new(vec![entry("A", "http://x/1")]);
    let publisher = FakePublisher::default();
    let shortener = FakeShortener::default();
    let reconciler = reconciler(&feed, shortener.clone(), &publisher, immediate_settings()).await;

    reconciler.detect().await.unwrap();
    let report = reconciler.publish().await.unwrap();

    assert_eq!(report.due, 1);
    assert_eq!(report.matched, 1);
    assert_eq!(report.posted, 1);
    assert_eq!(report.failed, 0);

    assert_eq!(shortener.shortened(), vec!["http://x/1".to_string()]);
    assert_eq!(publisher.sent(), vec!["A https://sho.rt/1".to_string()]);

    let repo = NewsRepository::new(reconciler.database().pool());
    let item = repo.get_by_link("http://x/1").await.unwrap().unwrap();
    assert_eq!(item.chat_id, CHAT_ID);
    assert_eq!(item.message_id, FIRST_MESSAGE_ID);
    assert!(repo.due_for_publish(now()).await.unwrap().is_empty());

    // Never posted twice
    let again = reconciler.publish().await.unwrap();
    assert_eq!(again.due, 0);
    assert_eq!(again.posted, 0);
    assert_eq!(publisher.attempts(), 1);
}

#[tokio::test]
async fn test_publish_skips_items_not_yet_due() {
    let feed = FakeFeed::new(vec![entry("A", "http://x/1")]);
    let publisher = FakePublisher::default();
    let settings = ReconcileSettings {
        pub_pause: 3600,
        ..immediate_settings()
    };
    let reconciler = reconciler(&feed, FakeShortener::default(), &publisher, settings).await;

    reconciler.detect().await.unwrap();
    let report = reconciler.publish().await.unwrap();

    assert_eq!(report.due, 0);
    assert_eq!(report.posted, 0);
    assert_eq!(publisher.attempts(), 0);
    // Only the detect fetch happened
    assert_eq!(feed.fetches(), 1);
}

#[tokio::test]
async fn test_publish_uses_original_link_when_shortening_fails() {
    let feed = FakeFeed::new(vec![entry("A", "http://x/1")]);
    let publisher = FakePublisher::default();
    // Nothing listens on the discard port
    let bitly = Bitly::new(
        &BitlyConfig {
            access_token: "token".to_string(),
            api_url: "http://127.0.0.1:9".to_string(),
        },
        &HttpConfig::default(),
    )
    .unwrap();
    let reconciler = reconciler(&feed, bitly, &publisher, immediate_settings()).await;

    reconciler.detect().await.unwrap();
    let report = reconciler.publish().await.unwrap();

    assert_eq!(report.posted, 1);
    assert_eq!(publisher.sent(), vec!["A http://x/1".to_string()]);
}

#[tokio::test]
async fn test_publish_skips_items_missing_from_live_feed() {
    let feed = FakeFeed::new(vec![entry("B", "http://x/2"), entry("A", "http://x/1")]);
    let publisher = FakePublisher::default();
    let reconciler =
        reconciler(&feed, IdentityShortener, &publisher, immediate_settings()).await;

    reconciler.detect().await.unwrap();

    // A was removed at the source
    feed.set(vec![entry("B", "http://x/2")]);
    let report = reconciler.publish().await.unwrap();

    assert_eq!(report.due, 2);
    assert_eq!(report.matched, 1);
    assert_eq!(report.posted, 1);
    assert_eq!(publisher.sent(), vec!["B http://x/2".to_string()]);

    let repo = NewsRepository::new(reconciler.database().pool());
    let remaining = repo.due_for_publish(now()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].link, "http://x/1");

    // Posted once it reappears
    feed.set(vec![entry("A", "http://x/1")]);
    let report = reconciler.publish().await.unwrap();
    assert_eq!(report.posted, 1);
    assert!(repo.due_for_publish(now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_publish_follows_detection_order_not_feed_order() {
    let feed = FakeFeed::new(vec![
        entry("C", "http://x/3"),
        entry("B", "http://x/2"),
        entry("A", "http://x/1"),
    ]);
    let publisher = FakePublisher::default();
    let reconciler =
        reconciler(&feed, IdentityShortener, &publisher, immediate_settings()).await;

    reconciler.detect().await.unwrap();

    // Live feed order changes between detect and publish
    feed.set(vec![
        entry("B", "http://x/2"),
        entry("A", "http://x/1"),
        entry("C", "http://x/3"),
    ]);
    reconciler.publish().await.unwrap();

    assert_eq!(
        publisher.sent(),
        vec![
            "A http://x/1".to_string(),
            "B http://x/2".to_string(),
            "C http://x/3".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_publish_newest_first_reverses_order() {
    let feed = FakeFeed::new(vec![entry("B", "http://x/2"), entry("A", "http://x/1")]);
    let publisher = FakePublisher::default();
    let settings = ReconcileSettings {
        publish_order: PublishOrder::NewestFirst,
        ..immediate_settings()
    };
    let reconciler = reconciler(&feed, IdentityShortener, &publisher, settings).await;

    reconciler.detect().await.unwrap();
    reconciler.publish().await.unwrap();

    assert_eq!(
        publisher.sent(),
        vec!["B http://x/2".to_string(), "A http://x/1".to_string()]
    );
}

#[tokio::test]
async fn test_publish_continues_after_failed_post() {
    let feed = FakeFeed::new(vec![entry("B", "http://x/2"), entry("A", "http://x/1")]);
    let publisher = FakePublisher::default();
    publisher.fail_on("http://x/1");
    let reconciler =
        reconciler(&feed, IdentityShortener, &publisher, immediate_settings()).await;

    reconciler.detect().await.unwrap();
    let report = reconciler.publish().await.unwrap();

    assert_eq!(report.matched, 2);
    assert_eq!(report.posted, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(publisher.sent(), vec!["B http://x/2".to_string()]);

    // The failed item stays due and goes out on the next run
    let repo = NewsRepository::new(reconciler.database().pool());
    let remaining = repo.due_for_publish(now()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].link, "http://x/1");

    publisher.clear_failures();
    let report = reconciler.publish().await.unwrap();
    assert_eq!(report.posted, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn test_publish_aborts_batch_when_configured() {
    let feed = FakeFeed::new(vec![entry("B", "http://x/2"), entry("A", "http://x/1")]);
    let publisher = FakePublisher::default();
    publisher.fail_on("http://x/1");
    let settings = ReconcileSettings {
        on_post_error: OnPostError::Abort,
        ..immediate_settings()
    };
    let reconciler = reconciler(&feed, IdentityShortener, &publisher, settings).await;

    reconciler.detect().await.unwrap();
    let result = reconciler.publish().await;

    assert!(matches!(result, Err(RelayError::Post(_))));
    assert!(publisher.sent().is_empty());
    assert_eq!(publisher.attempts(), 1);

    let repo = NewsRepository::new(reconciler.database().pool());
    assert_eq!(repo.due_for_publish(now()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_publish_escapes_html_in_titles() {
    let feed = FakeFeed::new(vec![entry("Q&A: <Rust>", "http://x/1")]);
    let publisher = FakePublisher::default();
    let reconciler =
        reconciler(&feed, IdentityShortener, &publisher, immediate_settings()).await;

    reconciler.detect().await.unwrap();
    reconciler.publish().await.unwrap();

    assert_eq!(
        publisher.sent(),
        vec!["Q&amp;A: &lt;Rust&gt; http://x/1".to_string()]
    );
}

#[tokio::test]
async fn test_publish_sleeps_between_messages() {
    let feed = FakeFeed::new(vec![entry("B", "http://x/2"), entry("A", "http://x/1")]);
    let publisher = FakePublisher::default();
    let settings = ReconcileSettings {
        delay_between_messages: Duration::from_millis(200),
        ..immediate_settings()
    };
    let reconciler = reconciler(&feed, IdentityShortener, &publisher, settings).await;

    reconciler.detect().await.unwrap();

    let started = std::time::Instant::now();
    let report = reconciler.publish().await.unwrap();

    assert_eq!(report.posted, 2);
    // One pause between two messages, none after the last
    assert!(started.elapsed() >= Duration::from_millis(200));
}
