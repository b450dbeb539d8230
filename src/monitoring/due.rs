//! Lazy, restartable streams over the due sets. Each stream walks keyset
//! pages ordered by id and never mutates anything.

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, TryStreamExt};
use std::future::Future;
use std::sync::Arc;

use crate::db::entities::{heartbeat, website};
use crate::db::store::{MonitorStore, StoreError};

fn keyset_pages<T, K, F, Fut>(
    page_size: u64,
    key: K,
    fetch: F,
) -> impl Stream<Item = Result<T, StoreError>>
where
    K: Fn(&T) -> i32 + Copy,
    F: Fn(Option<i32>, u64) -> Fut,
    Fut: Future<Output = Result<Vec<T>, StoreError>>,
{
    let page_size = page_size.max(1);
    // `None` ends the walk; `Some(after_id)` resumes after the last id seen.
    stream::try_unfold(Some(None), move |cursor: Option<Option<i32>>| {
        let pending = cursor.map(|after_id| fetch(after_id, page_size));
        async move {
            let Some(pending) = pending else {
                return Ok::<_, StoreError>(None);
            };
            let page = pending.await?;
            let next = if (page.len() as u64) < page_size {
                None
            } else {
                page.last().map(|item| Some(key(item)))
            };
            Ok(Some((stream::iter(page.into_iter().map(Ok::<T, StoreError>)), next)))
        }
    })
    .try_flatten()
}

/// Active websites with `next_check_at <= now`.
pub fn due_websites(
    store: Arc<dyn MonitorStore>,
    now: DateTime<Utc>,
    page_size: u64,
) -> impl Stream<Item = Result<website::Model, StoreError>> + Send {
    keyset_pages(
        page_size,
        |w: &website::Model| w.id,
        move |after_id, limit| {
            let store = store.clone();
            async move { store.due_websites(now, after_id, limit).await }
        },
    )
}

/// Up heartbeats whose `next_due` has passed.
pub fn due_heartbeats(
    store: Arc<dyn MonitorStore>,
    now: DateTime<Utc>,
    page_size: u64,
) -> impl Stream<Item = Result<heartbeat::Model, StoreError>> + Send {
    keyset_pages(
        page_size,
        |h: &heartbeat::Model| h.id,
        move |after_id, limit| {
            let store = store.clone();
            async move { store.due_heartbeats(now, after_id, limit).await }
        },
    )
}
