use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::{NotificationMethod, TargetKind};
use crate::db::target::TargetRef;

/// A user's subscription to alerts of one monitor over one channel.
/// At most one row exists per `(user_id, target_kind, target_id, method)`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification_preferences")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub target_kind: TargetKind,
    pub target_id: i32,
    pub method: NotificationMethod,
    /// Email address, webhook URL or phone number depending on `method`.
    pub target: String,
    pub is_active: bool,
    pub created_at: ChronoDateTimeUtc,
}

impl Model {
    pub fn monitor(&self) -> TargetRef {
        TargetRef::new(self.target_kind, self.target_id)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
