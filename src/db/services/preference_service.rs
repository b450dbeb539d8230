use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

use crate::db::entities::{notification_preference, prelude::*};
use crate::db::enums::NotificationMethod;
use crate::db::target::TargetRef;

pub async fn get_active_preferences<C: ConnectionTrait>(
    db: &C,
    target: TargetRef,
) -> Result<Vec<notification_preference::Model>, DbErr> {
    NotificationPreference::find()
        .filter(notification_preference::Column::TargetKind.eq(target.kind))
        .filter(notification_preference::Column::TargetId.eq(target.id))
        .filter(notification_preference::Column::IsActive.eq(true))
        .order_by_asc(notification_preference::Column::Id)
        .all(db)
        .await
}

pub async fn find_preference<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    target: TargetRef,
    method: NotificationMethod,
) -> Result<Option<notification_preference::Model>, DbErr> {
    NotificationPreference::find()
        .filter(notification_preference::Column::UserId.eq(user_id))
        .filter(notification_preference::Column::TargetKind.eq(target.kind))
        .filter(notification_preference::Column::TargetId.eq(target.id))
        .filter(notification_preference::Column::Method.eq(method))
        .one(db)
        .await
}

pub async fn insert_preference<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    target: TargetRef,
    method: NotificationMethod,
    address: String,
    now: DateTime<Utc>,
) -> Result<notification_preference::Model, DbErr> {
    notification_preference::ActiveModel {
        user_id: Set(user_id),
        target_kind: Set(target.kind),
        target_id: Set(target.id),
        method: Set(method),
        target: Set(address),
        is_active: Set(true),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}
