use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;

use super::{RateLimitError, WindowStore};

/// Per-process window store. The map entry lock makes each admit atomic.
#[derive(Default)]
pub struct MemoryWindowStore {
    windows: DashMap<String, VecDeque<(i64, String)>>,
}

impl MemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WindowStore for MemoryWindowStore {
    async fn admit(
        &self,
        key: &str,
        member: &str,
        now_ms: i64,
        window_ms: i64,
        max_calls: u64,
    ) -> Result<bool, RateLimitError> {
        let mut window = self.windows.entry(key.to_string()).or_default();
        let oldest_kept = now_ms.saturating_sub(window_ms);
        while window.front().is_some_and(|(at, _)| *at <= oldest_kept) {
            window.pop_front();
        }
        if (window.len() as u64) < max_calls {
            window.push_back((now_ms, member.to_string()));
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn release(&self, key: &str, member: &str) -> Result<(), RateLimitError> {
        if let Some(mut window) = self.windows.get_mut(key) {
            window.retain(|(_, m)| m != member);
        }
        Ok(())
    }
}
