//! Write-then-enqueue operations used by the request handlers.
//!
//! The job is only enqueued once the store write has succeeded, and the
//! caller never waits for it to be processed.

use tracing::{info, instrument};

use filehub_core::db::DatabaseError;

use crate::auth::password::digest_password;
use crate::jobs::{FileJob, Job, JobQueue, QueueError, UserJob};
use crate::storage::{FileKind, FileRecord, NewFile, Store, User, Users};

/// Producer errors.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// Client input rejected (missing field, duplicate email).
    #[error("{0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Create a user and schedule the welcome job.
#[instrument(skip(store, queue, password))]
pub async fn register_user(
    store: &Store,
    queue: &JobQueue,
    email: Option<&str>,
    password: Option<&str>,
) -> Result<User, ProducerError> {
    let email = email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ProducerError::Validation("Missing email".into()))?;
    let password = password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ProducerError::Validation("Missing password".into()))?;

    let users = store.users()?;
    if users.find_by_email(email).await?.is_some() {
        return Err(ProducerError::Validation("Already exist".into()));
    }

    let user = insert_user(&users, email, password).await?;

    queue
        .enqueue_job(&Job::User(UserJob {
            user_id: user.id.clone(),
        }))
        .await?;

    info!(user_id = %user.id, "User registered");
    Ok(user)
}

/// Insert the user row. A unique violation means a concurrent registration
/// of the same email won the race.
async fn insert_user(users: &Users, email: &str, password: &str) -> Result<User, ProducerError> {
    match users.insert(email, &digest_password(password)).await {
        Ok(user) => Ok(user),
        Err(DatabaseError::Conflict(_)) => Err(ProducerError::Validation("Already exist".into())),
        Err(e) => Err(e.into()),
    }
}

/// Record file metadata and, for images, schedule thumbnail generation.
#[instrument(skip_all, fields(user_id = %file.user_id, kind = %file.kind))]
pub async fn record_file(
    store: &Store,
    queue: &JobQueue,
    file: &NewFile,
) -> Result<FileRecord, ProducerError> {
    let record = store.files()?.insert(file).await?;

    if file.kind == FileKind::Image {
        queue
            .enqueue_job(&Job::File(FileJob {
                file_id: record.id.clone(),
                user_id: record.user_id.clone(),
            }))
            .await?;
    }

    info!(file_id = %record.id, "File recorded");
    Ok(record)
}
