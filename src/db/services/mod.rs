//! Data access over a sea-orm connection, one module per table group.
//!
//! Functions here take any `ConnectionTrait` so they compose inside a
//! transaction opened by the caller.

pub mod alert_service;
pub mod check_result_service;
pub mod heartbeat_service;
pub mod preference_service;
pub mod website_service;

pub use alert_service::*;
pub use check_result_service::*;
pub use heartbeat_service::*;
pub use preference_service::*;
pub use website_service::*;
