//! Persistent store for filehub.
//!
//! One long-lived `SQLite` pool behind a connector with an explicit
//! lifecycle, exposing the `users` and `files` collections and the durable
//! job table.

mod db;
mod models;
mod queries;
mod queries_jobs;


pub use db::{Store, StoreState};
pub use filehub_core::db::DatabaseError;
pub use models::*;
pub use queries::{Files, Users};
pub use queries_jobs::{JobCounts, Jobs, NewJob};
