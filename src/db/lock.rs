//! Run lease repository.
//!
//! A row in `run_locks` marks a run in progress. A running holder renews its
//! row as it goes; rows not renewed for longer than the stale threshold are
//! taken over, so a crashed run cannot block later ones forever.

use super::DbPool;
use crate::Result;

/// A lease held by the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLease {
    pub name: String,
    pub holder: String,
}

impl RunLease {
    pub fn new(name: impl Into<String>, holder: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            holder: holder.into(),
        }
    }
}

/// Repository for run lease operations.
pub struct RunLockRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> RunLockRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Try to take the lease `name` at time `now` (UNIX seconds).
    ///
    /// Returns `false` if another holder took or renewed it no more than
    /// `stale_after` seconds ago.
    pub async fn try_acquire(
        &self,
        name: &str,
        holder: &str,
        now: i64,
        stale_after: i64,
    ) -> Result<bool> {
        sqlx::query("DELETE FROM run_locks WHERE name = $1 AND acquired_at < $2")
            .bind(name)
            .bind(now - stale_after)
            .execute(self.pool)
            .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO run_locks (name, holder, acquired_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(holder)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Refresh the lease timestamp to `now`.
    ///
    /// Returns `false` if `holder` no longer owns the lease.
    pub async fn renew(&self, name: &str, holder: &str, now: i64) -> Result<bool> {
        let result =
            sqlx::query("UPDATE run_locks SET acquired_at = $1 WHERE name = $2 AND holder = $3")
                .bind(now)
                .bind(name)
                .bind(holder)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Release the lease if `holder` still owns it.
    pub async fn release(&self, name: &str, holder: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM run_locks WHERE name = $1 AND holder = $2")
            .bind(name)
            .bind(holder)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
