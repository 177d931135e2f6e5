//! Data models for filehub storage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A registered account. The password is only ever held as a digest.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub created_at: i64,
}

/// File metadata owned by the upload side of the service.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FileRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub kind: String,
    pub is_public: bool,
    pub parent_id: String,
    pub local_path: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobRow {
    pub id: i64,
    pub queue: String,
    pub payload: String,
    pub status: String,
    pub attempts: i64,
    pub max_attempts: i64,
    pub available_at: i64,
    pub locked_until: Option<i64>,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Kind of entry in the files collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Folder,
    File,
    Image,
}

impl FileKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::File => "file",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "folder" => Ok(Self::Folder),
            "file" => Ok(Self::File),
            "image" => Ok(Self::Image),
            other => Err(format!("unknown file kind: {other}")),
        }
    }
}

/// Parameters for inserting a file record.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub user_id: String,
    pub name: String,
    pub kind: FileKind,
    pub is_public: bool,
    pub parent_id: String,
    pub local_path: Option<String>,
}

/// Generate a fresh store identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Parse a store identifier, returning its canonical form.
///
/// Returns `None` when `raw` does not have the shape of a store identifier.
pub fn parse_id(raw: &str) -> Option<String> {
    uuid::Uuid::parse_str(raw)
        .ok()
        .map(|id| id.hyphenated().to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_accepts_generated_ids() {
        let id = new_id();
        assert_eq!(parse_id(&id).as_deref(), Some(id.as_str()));
    }

    #[test]
    fn parse_id_canonicalises_case() {
        let id = new_id();
        assert_eq!(parse_id(&id.to_uppercase()), Some(id));
    }

    #[test]
    fn parse_id_rejects_malformed() {
        assert!(parse_id("").is_none());
        assert!(parse_id("5f1e7d9c8b3a2e4f6a7b8c9d").is_none());
        assert!(parse_id("not-an-id").is_none());
    }

    #[test]
    fn file_kind_round_trips_through_str() {
        for kind in [FileKind::Folder, FileKind::File, FileKind::Image] {
            assert_eq!(kind.as_str().parse::<FileKind>().unwrap(), kind);
        }
        assert!("video".parse::<FileKind>().is_err());
    }
}
