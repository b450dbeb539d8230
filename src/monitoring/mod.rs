//! Website polling, heartbeat pings and the state machine behind both.

use thiserror::Error;

pub mod due;
pub mod heartbeat_monitor;
pub mod locks;
pub mod schedule;
pub mod website_monitor;

pub use self::heartbeat_monitor::{HeartbeatMonitor, PingOutcome};
pub use self::locks::TargetLocks;
pub use self::website_monitor::{CheckReport, Transition, WebsiteMonitor};

use crate::db::store::StoreError;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
