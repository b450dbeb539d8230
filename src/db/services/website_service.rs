use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::db::entities::{prelude::*, website};

#[allow(clippy::too_many_arguments)]
pub async fn create_website<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    name: Option<String>,
    url: String,
    check_interval: i32,
    expected_status: i32,
    timeout_ms: i32,
    now: DateTime<Utc>,
) -> Result<website::Model, DbErr> {
    website::ActiveModel {
        user_id: Set(user_id),
        name: Set(name),
        url: Set(url),
        check_interval: Set(check_interval),
        expected_status: Set(expected_status),
        timeout_ms: Set(timeout_ms),
        is_active: Set(true),
        is_down: Set(false),
        last_downtime_at: Set(None),
        last_recovered_at: Set(None),
        // New websites are due immediately.
        next_check_at: Set(now),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn get_website_by_id<C: ConnectionTrait>(
    db: &C,
    website_id: i32,
) -> Result<Option<website::Model>, DbErr> {
    Website::find_by_id(website_id).one(db).await
}

/// Active websites whose next check time has passed, ordered by id and
/// starting strictly after `after_id`.
pub async fn get_due_websites<C: ConnectionTrait>(
    db: &C,
    now: DateTime<Utc>,
    after_id: Option<i32>,
    limit: u64,
) -> Result<Vec<website::Model>, DbErr> {
    let mut query = Website::find()
        .filter(website::Column::IsActive.eq(true))
        .filter(website::Column::NextCheckAt.lte(now));
    if let Some(after_id) = after_id {
        query = query.filter(website::Column::Id.gt(after_id));
    }
    query
        .order_by_asc(website::Column::Id)
        .limit(limit)
        .all(db)
        .await
}

/// Persists the transition fields and the next check time of a website.
pub async fn update_website_state<C: ConnectionTrait>(
    db: &C,
    website: &website::Model,
) -> Result<website::Model, DbErr> {
    website::ActiveModel {
        id: Unchanged(website.id),
        is_down: Set(website.is_down),
        last_downtime_at: Set(website.last_downtime_at),
        last_recovered_at: Set(website.last_recovered_at),
        next_check_at: Set(website.next_check_at),
        ..Default::default()
    }
    .update(db)
    .await
}

pub async fn lock_website<C: ConnectionTrait>(
    db: &C,
    website_id: i32,
) -> Result<website::Model, DbErr> {
    Website::find_by_id(website_id)
        .lock_exclusive()
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("website {website_id}")))
}
