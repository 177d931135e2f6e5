//! Job payloads and the queues they travel on.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use filehub_core::db::DatabaseError;

use crate::storage::parse_id;

/// The two independently drained queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    File,
    User,
}

impl QueueName {
    pub const ALL: [Self; 2] = [Self::File, Self::User];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "fileQueue",
            Self::User => "userQueue",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thumbnail work for an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileJob {
    pub file_id: String,
    pub user_id: String,
}

/// Post-registration work for a new user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJob {
    pub user_id: String,
}

/// A unit of background work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    File(FileJob),
    User(UserJob),
}

impl Job {
    pub const fn queue(&self) -> QueueName {
        match self {
            Self::File(_) => QueueName::File,
            Self::User(_) => QueueName::User,
        }
    }

    /// Wire payload, e.g. `{"fileId": "...", "userId": "..."}`.
    pub fn payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::File(job) => serde_json::to_value(job),
            Self::User(job) => serde_json::to_value(job),
        }
    }
}

impl FileJob {
    /// Validate a delivered payload. Ids come back in canonical form.
    pub fn from_payload(payload: &Value) -> Result<Self, JobError> {
        Ok(Self {
            file_id: required_id(payload, "fileId")?,
            user_id: required_id(payload, "userId")?,
        })
    }
}

impl UserJob {
    /// Validate a delivered payload. The id comes back in canonical form.
    pub fn from_payload(payload: &Value) -> Result<Self, JobError> {
        Ok(Self {
            user_id: required_id(payload, "userId")?,
        })
    }
}

fn required_id(payload: &Value, field: &str) -> Result<String, JobError> {
    let raw = payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| JobError::InvalidPayload(format!("Missing {field}")))?;
    parse_id(raw).ok_or_else(|| JobError::InvalidPayload(format!("Invalid {field}")))
}

/// Why a job attempt failed. Every variant fails the attempt; the queue
/// decides whether it is retried.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),

    #[error("Processing failed: {0}")]
    Failed(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::storage::new_id;

    #[test]
    fn payload_field_names_are_fixed() {
        let job = Job::File(FileJob {
            file_id: "f".into(),
            user_id: "u".into(),
        });
        assert_eq!(job.payload().unwrap(), json!({"fileId": "f", "userId": "u"}));
        assert_eq!(job.queue(), QueueName::File);

        let job = Job::User(UserJob { user_id: "u".into() });
        assert_eq!(job.payload().unwrap(), json!({"userId": "u"}));
        assert_eq!(job.queue().as_str(), "userQueue");
    }

    #[test]
    fn file_job_requires_both_ids() {
        let file_id = new_id();
        let user_id = new_id();

        let job = FileJob::from_payload(&json!({"fileId": file_id, "userId": user_id})).unwrap();
        assert_eq!(job.file_id, file_id);

        let err = FileJob::from_payload(&json!({"userId": user_id})).unwrap_err();
        assert_eq!(err.to_string(), "Invalid payload: Missing fileId");
        let err = FileJob::from_payload(&json!({"fileId": file_id})).unwrap_err();
        assert_eq!(err.to_string(), "Invalid payload: Missing userId");
    }

    #[test]
    fn malformed_ids_are_rejected() {
        let err = UserJob::from_payload(&json!({"userId": "12345"})).unwrap_err();
        assert!(matches!(err, JobError::InvalidPayload(ref m) if m == "Invalid userId"));

        let err = UserJob::from_payload(&json!({"userId": 42})).unwrap_err();
        assert!(matches!(err, JobError::InvalidPayload(ref m) if m == "Missing userId"));

        assert!(UserJob::from_payload(&json!({})).is_err());
        assert!(UserJob::from_payload(&Value::Null).is_err());
    }
}
