//! SQLite-backed cache generations and upload queue.
//!
//! This module provides persistent, named cache namespaces using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Request identity keys using SHA-256 hashing
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - A single-writer upload queue stored inside its own generation

pub mod connection;
pub mod generations;
pub mod hash;
pub mod migrations;
pub mod queue;

pub use crate::Error;

pub use connection::CacheDb;
pub use generations::Generation;
pub use queue::UploadQueue;

/// Precached application shell and static assets.
pub const STATIC_ASSETS: &str = "static-assets";

/// Last successful `GET` responses under `/api/`.
pub const API_RESPONSES: &str = "api-responses";

/// Pending and dead-lettered uploads.
pub const UPLOAD_QUEUE: &str = "upload-queue";

/// Generations kept by activation; anything else is stale.
pub const CURRENT_GENERATIONS: &[&str] = &[STATIC_ASSETS, API_RESPONSES];

/// Generations that hold durable state rather than cached responses and are
/// never garbage-collected.
pub const DURABLE_GENERATIONS: &[&str] = &[UPLOAD_QUEUE];
