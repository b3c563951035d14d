//! Client code for harbor.
//!
//! This crate provides the origin transport, the per-category caching
//! strategies, upload replay, install/activate and client messaging shared
//! by the proxy server.

pub mod fetch;
pub mod lifecycle;
pub mod notify;
pub mod push;
pub mod strategy;
pub mod sync;

#[cfg(test)]
mod testing;

pub use fetch::{FetchClient, FetchConfig, Origin};
pub use lifecycle::{LifecycleManager, LifecycleState};
pub use notify::{ClientMessage, ClientNotifier};
pub use push::{Notification, PushHandler};
pub use strategy::{ServedFrom, StrategyConfig, StrategyExecutor, StrategyResult};
pub use sync::{DrainReport, RetryPolicy, SYNC_TAG, SyncCoordinator, SyncState};
