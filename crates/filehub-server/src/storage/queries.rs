//! Collection queries for filehub.

use sqlx::{Pool, Sqlite};

use filehub_core::db::{DatabaseError, unix_timestamp};

use super::models::{FileRecord, NewFile, User, new_id};

/// The users collection.
#[derive(Clone)]
pub struct Users {
    pool: Pool<Sqlite>,
}

impl Users {
    pub(super) const fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Insert a user and return the stored record with its assigned id.
    ///
    /// A concurrent insert of the same email is rejected by the unique index
    /// and reported as [`DatabaseError::Conflict`].
    pub async fn insert(&self, email: &str, password_digest: &str) -> Result<User, DatabaseError> {
        let id = new_id();
        let now = unix_timestamp();

        sqlx::query("INSERT INTO users (id, email, password, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(email)
            .bind(password_digest)
            .bind(now)
            .execute(&self.pool)
            .await?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User {id}")))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Email match is exact (case-sensitive).
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Find the user whose email and password digest both match.
    pub async fn find_by_credentials(
        &self,
        email: &str,
        password_digest: &str,
    ) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ? AND password = ?")
            .bind(email)
            .bind(password_digest)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn count(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

/// The files collection.
#[derive(Clone)]
pub struct Files {
    pool: Pool<Sqlite>,
}

impl Files {
    pub(super) const fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Insert a file record and return it with its assigned id.
    pub async fn insert(&self, file: &NewFile) -> Result<FileRecord, DatabaseError> {
        let id = new_id();
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO files (id, user_id, name, kind, is_public, parent_id, local_path, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&file.user_id)
        .bind(&file.name)
        .bind(file.kind.as_str())
        .bind(file.is_public)
        .bind(&file.parent_id)
        .bind(file.local_path.as_deref())
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("File {id}")))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let file = sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(file)
    }

    /// Find a file by id, only if it belongs to `user_id`.
    ///
    /// Ownership is part of the query, so a file owned by someone else is
    /// indistinguishable from a missing one.
    pub async fn find_owned(
        &self,
        file_id: &str,
        user_id: &str,
    ) -> Result<Option<FileRecord>, DatabaseError> {
        let file =
            sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE id = ? AND user_id = ?")
                .bind(file_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(file)
    }

    pub async fn count(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM files")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}
