//! News repository for newsrelay.

use super::types::NewsItem;
use crate::db::DbPool;
use crate::{RelayError, Result};

/// Row type for a news item from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct NewsRow {
    id: i64,
    text: String,
    link: String,
    date: i64,
    publish: i64,
    chat_id: i64,
    message_id: i64,
}

impl From<NewsRow> for NewsItem {
    fn from(row: NewsRow) -> Self {
        NewsItem {
            id: row.id,
            text: row.text,
            link: row.link,
            discovered_at: row.date,
            publish_at: row.publish,
            chat_id: row.chat_id,
            message_id: row.message_id,
        }
    }
}

/// Repository for news item operations.
pub struct NewsRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> NewsRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Check whether an item with this link is stored.
    pub async fn exists(&self, link: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news WHERE link = $1")
            .bind(link)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    /// Insert a new item and return the stored row.
    ///
    /// Fails if the link is already stored.
    pub async fn insert(&self, item: &NewsItem) -> Result<NewsItem> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO news (text, link, date, publish, chat_id, message_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&item.text)
        .bind(&item.link)
        .bind(item.discovered_at)
        .bind(item.publish_at)
        .bind(item.chat_id)
        .bind(item.message_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(NewsItem { id, ..item.clone() })
    }

    /// Get an item by link.
    pub async fn get_by_link(&self, link: &str) -> Result<Option<NewsItem>> {
        let row = sqlx::query_as::<_, NewsRow>(
            r#"
            SELECT id, text, link, date, publish, chat_id, message_id
            FROM news
            WHERE link = $1
            "#,
        )
        .bind(link)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(row.map(NewsItem::from))
    }

    /// List unposted items whose publication time is at or before `now`.
    ///
    /// Returns items in detection order (oldest first).
    pub async fn due_for_publish(&self, now: i64) -> Result<Vec<NewsItem>> {
        let rows = sqlx::query_as::<_, NewsRow>(
            r#"
            SELECT id, text, link, date, publish, chat_id, message_id
            FROM news
            WHERE message_id = 0 AND publish <= $1
            ORDER BY publish ASC, id ASC
            "#,
        )
        .bind(now)
        .fetch_all(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(NewsItem::from).collect())
    }

    /// Record the chat and message IDs of a posted item.
    ///
    /// Only unposted rows are updated. Returns `false` if no such row matches.
    pub async fn mark_posted(&self, link: &str, chat_id: i64, message_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE news SET chat_id = $1, message_id = $2 WHERE link = $3 AND message_id = 0",
        )
        .bind(chat_id)
        .bind(message_id)
        .bind(link)
        .execute(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Count stored items.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news")
            .fetch_one(self.pool)
            .await
            .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(count)
    }

    /// Count items not yet posted, due or not.
    pub async fn count_pending(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news WHERE message_id = 0")
            .fetch_one(self.pool)
            .await
            .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(count)
    }
}
