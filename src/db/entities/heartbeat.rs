use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::HeartbeatStatus;

/// A passive monitor that expects a ping every `interval` seconds.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "heartbeats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub key: Uuid,
    pub interval: i32,
    pub grace_period: i32,
    #[sea_orm(nullable)]
    pub last_ping: Option<ChronoDateTimeUtc>,
    #[sea_orm(nullable, indexed)]
    pub next_due: Option<ChronoDateTimeUtc>,
    pub status: HeartbeatStatus,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ping_log::Entity")]
    PingLog,
}

impl Related<super::ping_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PingLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
