use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which monitor table a polymorphic `(target_kind, target_id)` pair points into.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text", enum_name = "target_kind_enum")]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[sea_orm(string_value = "website")]
    Website,
    #[sea_orm(string_value = "heartbeat")]
    Heartbeat,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Website => write!(f, "website"),
            TargetKind::Heartbeat => write!(f, "heartbeat"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text", enum_name = "alert_kind_enum")]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    #[sea_orm(string_value = "downtime")]
    Downtime,
    #[sea_orm(string_value = "recovery")]
    Recovery,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Downtime => write!(f, "downtime"),
            AlertKind::Recovery => write!(f, "recovery"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text", enum_name = "heartbeat_status_enum")]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatStatus {
    #[sea_orm(string_value = "unknown")]
    Unknown,
    #[sea_orm(string_value = "up")]
    Up,
    #[sea_orm(string_value = "down")]
    Down,
}

impl fmt::Display for HeartbeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeartbeatStatus::Unknown => write!(f, "unknown"),
            HeartbeatStatus::Up => write!(f, "up"),
            HeartbeatStatus::Down => write!(f, "down"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text", enum_name = "notification_method_enum")]
#[serde(rename_all = "lowercase")]
pub enum NotificationMethod {
    #[sea_orm(string_value = "email")]
    Email,
    #[sea_orm(string_value = "slack")]
    Slack,
    #[sea_orm(string_value = "webhook")]
    Webhook,
    #[sea_orm(string_value = "whatsapp")]
    Whatsapp,
}

impl fmt::Display for NotificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationMethod::Email => write!(f, "email"),
            NotificationMethod::Slack => write!(f, "slack"),
            NotificationMethod::Webhook => write!(f, "webhook"),
            NotificationMethod::Whatsapp => write!(f, "whatsapp"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text", enum_name = "ping_status_enum")]
#[serde(rename_all = "lowercase")]
pub enum PingStatus {
    #[sea_orm(string_value = "success")]
    Success,
    #[sea_orm(string_value = "fail")]
    Fail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_stored_value() {
        assert_eq!(TargetKind::Heartbeat.to_string(), TargetKind::Heartbeat.to_value());
        assert_eq!(AlertKind::Recovery.to_string(), AlertKind::Recovery.to_value());
        assert_eq!(HeartbeatStatus::Down.to_string(), HeartbeatStatus::Down.to_value());
        assert_eq!(
            NotificationMethod::Whatsapp.to_string(),
            NotificationMethod::Whatsapp.to_value()
        );
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&NotificationMethod::Slack).unwrap();
        assert_eq!(json, "\"slack\"");
        let kind: TargetKind = serde_json::from_str("\"website\"").unwrap();
        assert_eq!(kind, TargetKind::Website);
    }
}
