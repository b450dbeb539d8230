//! Sliding-window admission control for inbound heartbeat pings.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::clock::Clock;

pub mod memory;
pub mod redis_store;

pub use self::memory::MemoryWindowStore;
pub use self::redis_store::RedisWindowStore;

#[derive(Error, Debug)]
pub enum RateLimitError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Window store unavailable: {0}")]
    Unavailable(String),
}

/// Backing set of accepted-call timestamps per key.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Atomically drops entries at or before `now_ms - window_ms`, then records
    /// `member` at `now_ms` and returns true if fewer than `max_calls` entries
    /// remain.
    async fn admit(
        &self,
        key: &str,
        member: &str,
        now_ms: i64,
        window_ms: i64,
        max_calls: u64,
    ) -> Result<bool, RateLimitError>;

    /// Removes a previously admitted entry.
    async fn release(&self, key: &str, member: &str) -> Result<(), RateLimitError>;
}

/// An admitted call. Releasing it frees its place in the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSlot {
    key: String,
    member: String,
}

pub struct RateLimiter {
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn WindowStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn key_for(heartbeat_id: i32, user_id: Option<i32>) -> String {
        match user_id {
            Some(user_id) => format!("rate:user:{user_id}:hb:{heartbeat_id}"),
            None => format!("rate:hb:{heartbeat_id}"),
        }
    }

    /// Returns the admitted slot, or `None` when the window is full. A failing
    /// store admits.
    pub async fn acquire(
        &self,
        heartbeat_id: i32,
        user_id: Option<i32>,
        window_seconds: u64,
        max_calls: u64,
    ) -> Option<WindowSlot> {
        let key = Self::key_for(heartbeat_id, user_id);
        let now_ms = self.clock.now().timestamp_millis();
        let window_ms = i64::try_from(window_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
        let member = format!("{now_ms}-{}", Uuid::new_v4());
        let admitted = match self
            .store
            .admit(&key, &member, now_ms, window_ms, max_calls)
            .await
        {
            Ok(admitted) => admitted,
            Err(e) => {
                warn!(key = %key, error = %e, "Rate limiter store failed; allowing call.");
                true
            }
        };
        admitted.then_some(WindowSlot { key, member })
    }

    /// Hands back a slot whose call did not go through.
    pub async fn release(&self, slot: WindowSlot) {
        if let Err(e) = self.store.release(&slot.key, &slot.member).await {
            warn!(key = %slot.key, error = %e, "Failed to release rate limiter slot.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone, Utc};

    struct BrokenStore;

    #[async_trait]
    impl WindowStore for BrokenStore {
        async fn admit(
            &self,
            _: &str,
            _: &str,
            _: i64,
            _: i64,
            _: u64,
        ) -> Result<bool, RateLimitError> {
            Err(RateLimitError::Unavailable("connection refused".to_string()))
        }

        async fn release(&self, _: &str, _: &str) -> Result<(), RateLimitError> {
            Err(RateLimitError::Unavailable("connection refused".to_string()))
        }
    }

    fn limiter() -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        ));
        let limiter = RateLimiter::new(Arc::new(MemoryWindowStore::new()), clock.clone());
        (limiter, clock)
    }

    #[test]
    fn test_key_format() {
        assert_eq!(RateLimiter::key_for(9, None), "rate:hb:9");
        assert_eq!(RateLimiter::key_for(9, Some(4)), "rate:user:4:hb:9");
    }

    #[tokio::test]
    async fn test_second_call_inside_window_is_rejected() {
        let (limiter, clock) = limiter();
        assert!(limiter.acquire(1, None, 10, 1).await.is_some());
        clock.advance(Duration::seconds(2));
        assert!(limiter.acquire(1, None, 10, 1).await.is_none());
    }

    #[tokio::test]
    async fn test_call_after_window_is_admitted() {
        let (limiter, clock) = limiter();
        assert!(limiter.acquire(1, None, 10, 1).await.is_some());
        clock.advance(Duration::seconds(11));
        assert!(limiter.acquire(1, None, 10, 1).await.is_some());
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let (limiter, _clock) = limiter();
        assert!(limiter.acquire(1, None, 60, 1).await.is_some());
        assert!(limiter.acquire(2, None, 60, 1).await.is_some());
        assert!(limiter.acquire(1, Some(5), 60, 1).await.is_some());
        assert!(limiter.acquire(1, None, 60, 1).await.is_none());
    }

    #[tokio::test]
    async fn test_released_slot_frees_the_window() {
        let (limiter, clock) = limiter();
        let slot = limiter.acquire(1, None, 60, 1).await.unwrap();
        limiter.release(slot).await;
        clock.advance(Duration::seconds(1));
        assert!(limiter.acquire(1, None, 60, 1).await.is_some());
        assert!(limiter.acquire(1, None, 60, 1).await.is_none());
    }

    #[tokio::test]
    async fn test_fails_open_when_store_breaks() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = RateLimiter::new(Arc::new(BrokenStore), clock);
        assert!(limiter.acquire(1, None, 10, 1).await.is_some());
        assert!(limiter.acquire(1, None, 10, 1).await.is_some());
    }
}
