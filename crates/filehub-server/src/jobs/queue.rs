//! Durable job queue backed by the store's job table.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use filehub_core::config::QueueConfig;
use filehub_core::db::DatabaseError;

use crate::storage::{JobCounts, JobRow, NewJob, Store};

use super::job::{Job, QueueName};

/// A leased job handed to one worker.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: i64,
    pub queue: QueueName,
    /// Attempt number of this lease; settles are rejected for stale attempts.
    pub attempt: i64,
    pub max_attempts: i64,
    pub payload: Value,
}

impl Delivery {
    fn from_row(queue: QueueName, row: JobRow) -> Self {
        // A payload that no longer parses is delivered as null and rejected
        // by the processor like any other invalid payload.
        let payload = serde_json::from_str(&row.payload).unwrap_or(Value::Null);
        Self {
            id: row.id,
            queue,
            attempt: row.attempts,
            max_attempts: row.max_attempts,
            payload,
        }
    }
}

/// What happened to a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Back in the queue for another attempt.
    Retrying,
    /// Out of attempts; kept with status `failed`.
    Failed,
    /// The lease was no longer ours (redelivered elsewhere).
    Stale,
}

/// Queue operation errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Producer and consumer access to the named queues.
#[derive(Clone)]
pub struct JobQueue {
    store: Store,
    config: QueueConfig,
}

impl JobQueue {
    pub const fn new(store: Store, config: QueueConfig) -> Self {
        Self { store, config }
    }

    pub const fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Enqueue a payload object. Accepted whether or not a worker is running.
    pub async fn enqueue(&self, queue: QueueName, payload: &Value) -> Result<i64, QueueError> {
        if !payload.is_object() {
            return Err(QueueError::InvalidPayload(
                "payload must be a JSON object".into(),
            ));
        }
        let payload = payload.to_string();
        let id = self
            .store
            .jobs()?
            .insert(&NewJob {
                queue: queue.as_str(),
                payload: &payload,
                max_attempts: self.config.max_attempts.max(1),
            })
            .await?;

        debug!(queue = %queue, job_id = id, "Job enqueued");
        Ok(id)
    }

    /// Enqueue a typed job on the queue its variant belongs to.
    pub async fn enqueue_job(&self, job: &Job) -> Result<i64, QueueError> {
        let payload = job
            .payload()
            .map_err(|e| QueueError::InvalidPayload(e.to_string()))?;
        self.enqueue(job.queue(), &payload).await
    }

    /// Lease the next deliverable job, if any.
    pub async fn claim(&self, queue: QueueName) -> Result<Option<Delivery>, QueueError> {
        let row = self
            .store
            .jobs()?
            .claim(queue.as_str(), self.config.lease_secs)
            .await?;
        Ok(row.map(|row| Delivery::from_row(queue, row)))
    }

    /// How often a running attempt renews its lease.
    ///
    /// A third of the lease, so a renewal always lands before the
    /// second-resolution deadline passes.
    pub fn renew_interval(&self) -> Duration {
        let lease_ms = u64::try_from(self.config.lease_secs.max(1))
            .unwrap_or(1)
            .saturating_mul(1000);
        Duration::from_millis((lease_ms / 3).max(100))
    }

    /// Keep a delivery leased while it is still being processed.
    ///
    /// Returns `false` when the lease has already moved to another attempt.
    pub async fn extend_lease(&self, delivery: &Delivery) -> Result<bool, QueueError> {
        let held = self
            .store
            .jobs()?
            .extend_lease(delivery.id, delivery.attempt, self.config.lease_secs)
            .await?;
        if !held {
            warn!(
                queue = %delivery.queue,
                job_id = delivery.id,
                attempt = delivery.attempt,
                "Lease lost while the job was running"
            );
        }
        Ok(held)
    }

    /// Remove a delivery that was processed successfully.
    pub async fn complete(&self, delivery: &Delivery) -> Result<bool, QueueError> {
        let done = self
            .store
            .jobs()?
            .complete(delivery.id, delivery.attempt)
            .await?;
        if !done {
            warn!(
                queue = %delivery.queue,
                job_id = delivery.id,
                attempt = delivery.attempt,
                "Completed a delivery whose lease had moved on"
            );
        }
        Ok(done)
    }

    /// Record a failed attempt: retry while attempts remain, else park it.
    pub async fn fail(&self, delivery: &Delivery, error: &str) -> Result<FailOutcome, QueueError> {
        let jobs = self.store.jobs()?;
        let outcome = if delivery.attempt < delivery.max_attempts {
            let moved = jobs
                .retry_later(
                    delivery.id,
                    delivery.attempt,
                    error,
                    self.config.retry_delay_secs,
                )
                .await?;
            if moved {
                FailOutcome::Retrying
            } else {
                FailOutcome::Stale
            }
        } else if jobs
            .park_failed(delivery.id, delivery.attempt, error)
            .await?
        {
            FailOutcome::Failed
        } else {
            FailOutcome::Stale
        };

        match outcome {
            FailOutcome::Failed => warn!(
                queue = %delivery.queue,
                job_id = delivery.id,
                attempts = delivery.attempt,
                error,
                "Job failed permanently"
            ),
            FailOutcome::Retrying => info!(
                queue = %delivery.queue,
                job_id = delivery.id,
                attempt = delivery.attempt,
                error,
                "Job attempt failed, will retry"
            ),
            FailOutcome::Stale => {}
        }
        Ok(outcome)
    }

    /// Fail jobs whose lease expired with no attempts left.
    pub async fn reap_stale(&self, queue: QueueName) -> Result<u64, QueueError> {
        let reaped = self.store.jobs()?.reap_stale(queue.as_str()).await?;
        if reaped > 0 {
            warn!(queue = %queue, reaped, "Expired leases marked failed");
        }
        Ok(reaped)
    }

    pub async fn counts(&self, queue: QueueName) -> Result<JobCounts, QueueError> {
        Ok(self.store.jobs()?.counts(queue.as_str()).await?)
    }
}
