use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An HTTP endpoint polled on a fixed minute interval.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "websites")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    #[sea_orm(nullable)]
    pub name: Option<String>,
    pub url: String,
    /// Minutes between checks.
    pub check_interval: i32,
    pub expected_status: i32,
    pub timeout_ms: i32,
    pub is_active: bool,
    pub is_down: bool,
    #[sea_orm(nullable)]
    pub last_downtime_at: Option<ChronoDateTimeUtc>,
    #[sea_orm(nullable)]
    pub last_recovered_at: Option<ChronoDateTimeUtc>,
    #[sea_orm(indexed)]
    pub next_check_at: ChronoDateTimeUtc,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::uptime_check_result::Entity")]
    UptimeCheckResult,
}

impl Related<super::uptime_check_result::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UptimeCheckResult.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
