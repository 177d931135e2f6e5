//! filehub Server Library
//!
//! Core functionality for the filehub service:
//! - `SQLite` store connector for users, files, and the durable job table
//! - In-process session cache and token-based authentication
//! - Job queues, worker pools, and the thumbnail/welcome consumers
//! - Producers that enqueue work after a successful store write
//! - A thin axum HTTP surface

pub mod auth;
pub mod http;
pub mod jobs;
pub mod processors;
pub mod producers;
pub mod session;
pub mod storage;
