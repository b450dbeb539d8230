use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::PingStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "ping_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(indexed)]
    pub heartbeat_id: i32,
    pub timestamp: ChronoDateTimeUtc,
    pub status: PingStatus,
    /// Job runtime in seconds, as reported by the caller.
    #[sea_orm(column_type = "Double", nullable)]
    pub runtime: Option<f64>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    #[sea_orm(nullable)]
    pub ip: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub user_agent: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::heartbeat::Entity",
        from = "Column::HeartbeatId",
        to = "super::heartbeat::Column::Id",
        on_delete = "Cascade"
    )]
    Heartbeat,
}

impl Related<super::heartbeat::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Heartbeat.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
