use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::db::entities::{prelude::*, uptime_check_result};

pub async fn insert_check_result<C: ConnectionTrait>(
    db: &C,
    website_id: i32,
    status_code: i32,
    error_message: Option<String>,
    response_time_ms: f64,
    checked_at: DateTime<Utc>,
) -> Result<uptime_check_result::Model, DbErr> {
    uptime_check_result::ActiveModel {
        website_id: Set(website_id),
        status_code: Set(status_code),
        error_message: Set(error_message),
        response_time_ms: Set(response_time_ms),
        checked_at: Set(checked_at),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// The most recent results of a website, newest first.
pub async fn get_recent_check_results<C: ConnectionTrait>(
    db: &C,
    website_id: i32,
    count: u64,
) -> Result<Vec<uptime_check_result::Model>, DbErr> {
    UptimeCheckResult::find()
        .filter(uptime_check_result::Column::WebsiteId.eq(website_id))
        .order_by_desc(uptime_check_result::Column::CheckedAt)
        .order_by_desc(uptime_check_result::Column::Id)
        .limit(count)
        .all(db)
        .await
}

pub async fn delete_check_results_before<C: ConnectionTrait>(
    db: &C,
    cutoff: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let result = UptimeCheckResult::delete_many()
        .filter(uptime_check_result::Column::CheckedAt.lt(cutoff))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
