use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};

use crate::db::entities::{alert, prelude::*};
use crate::db::enums::AlertKind;
use crate::db::target::TargetRef;

pub async fn get_active_alert<C: ConnectionTrait>(
    db: &C,
    target: TargetRef,
    kind: AlertKind,
) -> Result<Option<alert::Model>, DbErr> {
    Alert::find()
        .filter(alert::Column::TargetKind.eq(target.kind))
        .filter(alert::Column::TargetId.eq(target.id))
        .filter(alert::Column::AlertType.eq(kind))
        .filter(alert::Column::IsActive.eq(true))
        .one(db)
        .await
}

pub async fn insert_alert<C: ConnectionTrait>(
    db: &C,
    target: TargetRef,
    kind: AlertKind,
    is_active: bool,
    now: DateTime<Utc>,
) -> Result<alert::Model, DbErr> {
    alert::ActiveModel {
        target_kind: Set(target.kind),
        target_id: Set(target.id),
        alert_type: Set(kind),
        is_active: Set(is_active),
        last_sent_at: Set(now),
        retry_count: Set(1),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Records one more notification for an open alert.
pub async fn bump_alert_retry<C: ConnectionTrait>(
    db: &C,
    existing: &alert::Model,
    now: DateTime<Utc>,
) -> Result<alert::Model, DbErr> {
    let mut active: alert::ActiveModel = existing.clone().into();
    active.retry_count = Set(existing.retry_count + 1);
    active.last_sent_at = Set(now);
    active.update(db).await
}

pub async fn deactivate_alert<C: ConnectionTrait>(
    db: &C,
    existing: &alert::Model,
) -> Result<alert::Model, DbErr> {
    let mut active: alert::ActiveModel = existing.clone().into();
    active.is_active = Set(false);
    active.update(db).await
}
