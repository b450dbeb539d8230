use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::db::entities::{heartbeat, ping_log, prelude::*};
use crate::db::enums::{HeartbeatStatus, PingStatus};

pub async fn create_heartbeat<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    name: String,
    interval: i32,
    grace_period: i32,
    next_due: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<heartbeat::Model, DbErr> {
    heartbeat::ActiveModel {
        user_id: Set(user_id),
        name: Set(name),
        key: Set(Uuid::new_v4()),
        interval: Set(interval),
        grace_period: Set(grace_period),
        last_ping: Set(None),
        next_due: Set(Some(next_due)),
        status: Set(HeartbeatStatus::Unknown),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn get_heartbeat_by_id<C: ConnectionTrait>(
    db: &C,
    heartbeat_id: i32,
) -> Result<Option<heartbeat::Model>, DbErr> {
    Heartbeat::find_by_id(heartbeat_id).one(db).await
}

pub async fn get_heartbeat_by_key<C: ConnectionTrait>(
    db: &C,
    key: Uuid,
) -> Result<Option<heartbeat::Model>, DbErr> {
    Heartbeat::find()
        .filter(heartbeat::Column::Key.eq(key))
        .one(db)
        .await
}

/// Heartbeats that are up, have pinged at least once, and are past their due time.
pub async fn get_overdue_heartbeats<C: ConnectionTrait>(
    db: &C,
    now: DateTime<Utc>,
    after_id: Option<i32>,
    limit: u64,
) -> Result<Vec<heartbeat::Model>, DbErr> {
    let mut query = Heartbeat::find()
        .filter(heartbeat::Column::Status.eq(HeartbeatStatus::Up))
        .filter(heartbeat::Column::LastPing.is_not_null())
        .filter(heartbeat::Column::NextDue.lt(now));
    if let Some(after_id) = after_id {
        query = query.filter(heartbeat::Column::Id.gt(after_id));
    }
    query
        .order_by_asc(heartbeat::Column::Id)
        .limit(limit)
        .all(db)
        .await
}

pub async fn lock_heartbeat<C: ConnectionTrait>(
    db: &C,
    heartbeat_id: i32,
) -> Result<heartbeat::Model, DbErr> {
    Heartbeat::find_by_id(heartbeat_id)
        .lock_exclusive()
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("heartbeat {heartbeat_id}")))
}

pub async fn mark_heartbeat_up<C: ConnectionTrait>(
    db: &C,
    heartbeat_id: i32,
    pinged_at: DateTime<Utc>,
    next_due: DateTime<Utc>,
) -> Result<heartbeat::Model, DbErr> {
    heartbeat::ActiveModel {
        id: Unchanged(heartbeat_id),
        last_ping: Set(Some(pinged_at)),
        next_due: Set(Some(next_due)),
        status: Set(HeartbeatStatus::Up),
        updated_at: Set(pinged_at),
        ..Default::default()
    }
    .update(db)
    .await
}

pub async fn mark_heartbeat_down<C: ConnectionTrait>(
    db: &C,
    heartbeat_id: i32,
    now: DateTime<Utc>,
) -> Result<heartbeat::Model, DbErr> {
    heartbeat::ActiveModel {
        id: Unchanged(heartbeat_id),
        status: Set(HeartbeatStatus::Down),
        updated_at: Set(now),
        ..Default::default()
    }
    .update(db)
    .await
}

pub async fn set_heartbeat_key<C: ConnectionTrait>(
    db: &C,
    heartbeat_id: i32,
    key: Uuid,
    now: DateTime<Utc>,
) -> Result<heartbeat::Model, DbErr> {
    heartbeat::ActiveModel {
        id: Unchanged(heartbeat_id),
        key: Set(key),
        updated_at: Set(now),
        ..Default::default()
    }
    .update(db)
    .await
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_ping_log<C: ConnectionTrait>(
    db: &C,
    heartbeat_id: i32,
    timestamp: DateTime<Utc>,
    status: PingStatus,
    runtime: Option<f64>,
    notes: Option<String>,
    ip: Option<String>,
    user_agent: Option<String>,
) -> Result<ping_log::Model, DbErr> {
    ping_log::ActiveModel {
        heartbeat_id: Set(heartbeat_id),
        timestamp: Set(timestamp),
        status: Set(status),
        runtime: Set(runtime),
        notes: Set(notes),
        ip: Set(ip),
        user_agent: Set(user_agent),
        ..Default::default()
    }
    .insert(db)
    .await
}
