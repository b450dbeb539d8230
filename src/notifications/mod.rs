pub mod models;
pub mod senders;
pub mod service;
pub mod templates;

pub use models::{RenderedMessage, RetryPolicy};
pub use service::{NotificationDispatcher, NotificationError};
