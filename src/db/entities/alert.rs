use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::{AlertKind, TargetKind};
use crate::db::target::TargetRef;

/// One incident thread for a monitor. The `(target_kind, target_id)` pair
/// points at either a website or a heartbeat.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "alerts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub target_kind: TargetKind,
    pub target_id: i32,
    pub alert_type: AlertKind,
    pub is_active: bool,
    pub last_sent_at: ChronoDateTimeUtc,
    pub retry_count: i32,
    pub created_at: ChronoDateTimeUtc,
}

impl Model {
    pub fn target(&self) -> TargetRef {
        TargetRef::new(self.target_kind, self.target_id)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
