//! Durable job queues and the workers that drain them.
//!
//! Producers enqueue after their store write succeeds; a [`WorkerPool`] per
//! queue leases jobs, hands the payload to a [`JobProcessor`], and settles the
//! delivery. Delivery is at-least-once, so processors must tolerate repeats.

pub mod job;
pub mod queue;
pub mod worker;

pub use job::{FileJob, Job, JobError, QueueName, UserJob};
pub use queue::{Delivery, FailOutcome, JobQueue, QueueError};
pub use worker::{JobProcessor, WorkerPool};
