//! Request, response and queue record types shared by every component.

pub mod request;
pub mod response;
pub mod upload;

pub use request::{Destination, InterceptedRequest};
pub use response::CachedResponse;
pub use upload::UploadQueueItem;
