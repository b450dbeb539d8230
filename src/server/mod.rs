pub mod config;
pub mod services;

pub use config::{ConfigError, ServerConfig};
pub use services::{build_sender_registry, CoreServices};
