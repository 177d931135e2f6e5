//! Semaphore-bounded worker pool for one queue.
//!
//! The [`WorkerPool`] keeps up to `concurrency` deliveries in flight. Each
//! delivery runs in its own task, renews its lease while the processor is
//! busy, and is settled on the queue when the processor returns: success
//! removes it, an error fails the attempt.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::job::{JobError, QueueName};
use super::queue::{Delivery, JobQueue, QueueError};

/// Default number of concurrent workers per queue.
const DEFAULT_CONCURRENCY: usize = 4;

/// Consumer logic for one queue.
pub trait JobProcessor: Send + Sync + 'static {
    /// The queue this processor drains.
    fn queue(&self) -> QueueName;

    /// Handle one delivered payload. Must be safe to run more than once for
    /// the same job.
    fn process(&self, payload: &Value) -> impl Future<Output = Result<(), JobError>> + Send;
}

/// Drains one queue with bounded concurrency.
pub struct WorkerPool<P> {
    queue: JobQueue,
    processor: Arc<P>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    poll_interval: Duration,
}

impl<P: JobProcessor> WorkerPool<P> {
    /// Create a pool. A concurrency of zero falls back to the default.
    pub fn new(queue: JobQueue, processor: P) -> Self {
        let concurrency = match queue.config().concurrency {
            0 => DEFAULT_CONCURRENCY,
            n => n,
        };
        let poll_interval = Duration::from_millis(queue.config().poll_interval_ms.max(1));

        Self {
            queue,
            processor: Arc::new(processor),
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            poll_interval,
        }
    }

    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Claim and process a single job inline. Returns whether one was found.
    pub async fn run_once(&self) -> Result<bool, QueueError> {
        let Some(delivery) = self.queue.claim(self.processor.queue()).await? else {
            return Ok(false);
        };
        handle_delivery(&self.queue, self.processor.as_ref(), delivery).await;
        Ok(true)
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped).
    /// In-flight jobs are allowed to finish.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let name = self.processor.queue();
        info!(queue = %name, concurrency = self.concurrency, "Worker pool started");

        let mut tasks = JoinSet::new();
        loop {
            if *shutdown.borrow() {
                break;
            }
            while tasks.try_join_next().is_some() {}

            let permit = tokio::select! {
                permit = Arc::clone(&self.semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = shutdown.changed() => break,
            };

            let idle = match self.queue.claim(name).await {
                Ok(Some(delivery)) => {
                    let queue = self.queue.clone();
                    let processor = Arc::clone(&self.processor);
                    tasks.spawn(async move {
                        handle_delivery(&queue, processor.as_ref(), delivery).await;
                        drop(permit);
                    });
                    false
                }
                Ok(None) => {
                    drop(permit);
                    if let Err(e) = self.queue.reap_stale(name).await {
                        warn!(queue = %name, error = %e, "Failed to reap stale jobs");
                    }
                    true
                }
                Err(e) => {
                    drop(permit);
                    warn!(queue = %name, error = %e, "Failed to claim job");
                    true
                }
            };

            if idle {
                tokio::select! {
                    () = tokio::time::sleep(self.poll_interval) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }

        let in_flight = tasks.len();
        if in_flight > 0 {
            info!(queue = %name, in_flight, "Waiting for in-flight jobs");
        }
        while tasks.join_next().await.is_some() {}
        info!(queue = %name, "Worker pool stopped");
    }
}

async fn handle_delivery<P: JobProcessor>(queue: &JobQueue, processor: &P, delivery: Delivery) {
    debug!(
        queue = %delivery.queue,
        job_id = delivery.id,
        attempt = delivery.attempt,
        "Processing job"
    );

    let result = {
        let work = processor.process(&delivery.payload);
        tokio::pin!(work);

        let mut renew = tokio::time::interval(queue.renew_interval());
        renew.tick().await; // Skip first immediate tick
        let mut renewing = true;
        loop {
            tokio::select! {
                result = &mut work => break result,
                _ = renew.tick(), if renewing => {
                    match queue.extend_lease(&delivery).await {
                        Ok(held) => renewing = held,
                        Err(e) => warn!(
                            queue = %delivery.queue,
                            job_id = delivery.id,
                            error = %e,
                            "Failed to renew lease"
                        ),
                    }
                }
            }
        }
    };

    let settled = match result {
        Ok(()) => queue.complete(&delivery).await.map(|_| ()),
        Err(e) => {
            let message = e.to_string();
            warn!(
                queue = %delivery.queue,
                job_id = delivery.id,
                attempt = delivery.attempt,
                error = %message,
                "Job attempt failed"
            );
            queue.fail(&delivery, &message).await.map(|_| ())
        }
    };

    // The lease expires on its own if settling fails, so the job is redelivered.
    if let Err(e) = settled {
        warn!(
            queue = %delivery.queue,
            job_id = delivery.id,
            error = %e,
            "Failed to settle job"
        );
    }
}
