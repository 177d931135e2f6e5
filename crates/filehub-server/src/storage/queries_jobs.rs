//! Durable job table queries.
//!
//! A job row moves `waiting` -> `active` (leased) -> deleted on success, or
//! back to `waiting` / on to `failed` when an attempt fails.

use sqlx::{Pool, Sqlite};

use filehub_core::db::{DatabaseError, unix_timestamp};

use super::models::JobRow;

/// Parameters for enqueueing a job.
pub struct NewJob<'a> {
    pub queue: &'a str,
    pub payload: &'a str,
    pub max_attempts: i64,
}

/// Per-status job counts for one queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub waiting: i64,
    pub active: i64,
    pub failed: i64,
}

/// The job table.
#[derive(Clone)]
pub struct Jobs {
    pool: Pool<Sqlite>,
}

impl Jobs {
    pub(super) const fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Insert a waiting job. Returns the job id.
    pub async fn insert(&self, job: &NewJob<'_>) -> Result<i64, DatabaseError> {
        let now = unix_timestamp();

        let result = sqlx::query(
            "INSERT INTO jobs (queue, payload, status, attempts, max_attempts, available_at, created_at, updated_at) VALUES (?, ?, 'waiting', 0, ?, ?, ?, ?)",
        )
        .bind(job.queue)
        .bind(job.payload)
        .bind(job.max_attempts)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Lease the oldest deliverable job of `queue` for `lease_secs`.
    ///
    /// Deliverable means waiting and due, or active with an expired lease and
    /// attempts left. The select and the lease happen in one statement, so two
    /// workers can never hold the same delivery.
    pub async fn claim(&self, queue: &str, lease_secs: i64) -> Result<Option<JobRow>, DatabaseError> {
        let now = unix_timestamp();

        let job = sqlx::query_as::<_, JobRow>(
            "UPDATE jobs SET status = 'active', attempts = attempts + 1, locked_until = ?, updated_at = ? \
             WHERE id = ( \
                 SELECT id FROM jobs WHERE queue = ? AND ( \
                     (status = 'waiting' AND available_at <= ?) \
                     OR (status = 'active' AND locked_until <= ? AND attempts < max_attempts) \
                 ) ORDER BY id ASC LIMIT 1 \
             ) RETURNING *",
        )
        .bind(now + lease_secs)
        .bind(now)
        .bind(queue)
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    /// Delete a job after a successful attempt.
    ///
    /// Only the holder of the current lease (matching `attempt`) may complete it.
    pub async fn complete(&self, id: i64, attempt: i64) -> Result<bool, DatabaseError> {
        let result =
            sqlx::query("DELETE FROM jobs WHERE id = ? AND attempts = ? AND status = 'active'")
                .bind(id)
                .bind(attempt)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Push the lease of a running attempt out to `lease_secs` from now.
    ///
    /// Returns `false` when the attempt no longer holds the lease.
    pub async fn extend_lease(&self, id: i64, attempt: i64, lease_secs: i64) -> Result<bool, DatabaseError> {
        let now = unix_timestamp();

        let result = sqlx::query(
            "UPDATE jobs SET locked_until = ?, updated_at = ? WHERE id = ? AND attempts = ? AND status = 'active'",
        )
        .bind(now + lease_secs)
        .bind(now)
        .bind(id)
        .bind(attempt)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Return a failed attempt to the queue, due after `delay_secs`.
    pub async fn retry_later(
        &self,
        id: i64,
        attempt: i64,
        error: &str,
        delay_secs: i64,
    ) -> Result<bool, DatabaseError> {
        let now = unix_timestamp();

        let result = sqlx::query(
            "UPDATE jobs SET status = 'waiting', locked_until = NULL, last_error = ?, available_at = ?, updated_at = ? \
             WHERE id = ? AND attempts = ? AND status = 'active'",
        )
        .bind(error)
        .bind(now + delay_secs)
        .bind(now)
        .bind(id)
        .bind(attempt)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Park a job as permanently failed.
    pub async fn park_failed(&self, id: i64, attempt: i64, error: &str) -> Result<bool, DatabaseError> {
        let now = unix_timestamp();

        let result = sqlx::query(
            "UPDATE jobs SET status = 'failed', locked_until = NULL, last_error = ?, updated_at = ? \
             WHERE id = ? AND attempts = ? AND status = 'active'",
        )
        .bind(error)
        .bind(now)
        .bind(id)
        .bind(attempt)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark expired leases that have no attempts left as failed.
    pub async fn reap_stale(&self, queue: &str) -> Result<u64, DatabaseError> {
        let now = unix_timestamp();

        let result = sqlx::query(
            "UPDATE jobs SET status = 'failed', locked_until = NULL, last_error = COALESCE(last_error, 'lease expired'), updated_at = ? \
             WHERE queue = ? AND status = 'active' AND locked_until <= ? AND attempts >= max_attempts",
        )
        .bind(now)
        .bind(queue)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn get(&self, id: i64) -> Result<Option<JobRow>, DatabaseError> {
        let job = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    pub async fn counts(&self, queue: &str) -> Result<JobCounts, DatabaseError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM jobs WHERE queue = ? GROUP BY status")
                .bind(queue)
                .fetch_all(&self.pool)
                .await?;

        let mut counts = JobCounts::default();
        for (status, n) in rows {
            match status.as_str() {
                "waiting" => counts.waiting = n,
                "active" => counts.active = n,
                "failed" => counts.failed = n,
                _ => {}
            }
        }
        Ok(counts)
    }
}
