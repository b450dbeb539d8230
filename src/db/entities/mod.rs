//! SeaORM entities for monitors, their logs, alerts and subscriber preferences.

pub mod alert;
pub mod heartbeat;
pub mod notification_preference;
pub mod ping_log;
pub mod uptime_check_result;
pub mod website;

pub mod prelude {
    pub use super::alert::Entity as Alert;
    pub use super::heartbeat::Entity as Heartbeat;
    pub use super::notification_preference::Entity as NotificationPreference;
    pub use super::ping_log::Entity as PingLog;
    pub use super::uptime_check_result::Entity as UptimeCheckResult;
    pub use super::website::Entity as Website;
}
