use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status code recorded when the request never produced a response.
pub const FAILED_CONNECTION: i32 = 0;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "uptime_check_results")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(indexed)]
    pub website_id: i32,
    pub status_code: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    #[sea_orm(column_type = "Double")]
    pub response_time_ms: f64,
    #[sea_orm(indexed)]
    pub checked_at: ChronoDateTimeUtc,
}

impl Model {
    pub fn is_passed(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::website::Entity",
        from = "Column::WebsiteId",
        to = "super::website::Column::Id",
        on_delete = "Cascade",
        on_update = "Cascade"
    )]
    Website,
}

impl Related<super::website::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Website.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
