//! Core types and shared functionality for harbor.
//!
//! This crate provides:
//! - Cache generations and the upload queue with a SQLite backend
//! - Request/response model and request classification
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod model;

pub use cache::{CacheDb, Generation, UploadQueue};
pub use classify::{RequestCategory, classify};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use model::{CachedResponse, Destination, InterceptedRequest, UploadQueueItem};
