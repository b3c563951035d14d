//! Route handlers.

pub mod events;
pub mod proxy;
pub mod queue;
pub mod signals;
