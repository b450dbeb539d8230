use async_trait::async_trait;
use redis::{Client, Script};

use super::{RateLimitError, WindowStore};

// ZSET scored by millisecond timestamps. Purge, count and insert run as one
// script so concurrent instances see a consistent window.
const ADMIT_SCRIPT: &str = r#"
local cutoff = tonumber(ARGV[1]) - tonumber(ARGV[2])
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', cutoff)
local count = redis.call('ZCARD', KEYS[1])
if count < tonumber(ARGV[3]) then
    redis.call('ZADD', KEYS[1], ARGV[1], ARGV[4])
    redis.call('PEXPIRE', KEYS[1], tonumber(ARGV[2]) + 1000)
    return 1
end
return 0
"#;

/// Window store shared across instances through Redis.
pub struct RedisWindowStore {
    client: Client,
    script: Script,
}

impl RedisWindowStore {
    pub fn new(redis_url: &str) -> Result<Self, RateLimitError> {
        let client = Client::open(redis_url)?;
        Ok(Self {
            client,
            script: Script::new(ADMIT_SCRIPT),
        })
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn admit(
        &self,
        key: &str,
        member: &str,
        now_ms: i64,
        window_ms: i64,
        max_calls: u64,
    ) -> Result<bool, RateLimitError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let admitted: i64 = self
            .script
            .key(key)
            .arg(now_ms)
            .arg(window_ms)
            .arg(max_calls)
            .arg(member)
            .invoke_async(&mut conn)
            .await?;
        Ok(admitted == 1)
    }

    async fn release(&self, key: &str, member: &str) -> Result<(), RateLimitError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("ZREM")
            .arg(key)
            .arg(member)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_url() {
        assert!(RedisWindowStore::new("not a redis url").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_error() {
        let store = RedisWindowStore::new("redis://127.0.0.1:1/").unwrap();
        assert!(store.admit("rate:hb:1", "0-a", 0, 10_000, 1).await.is_err());
        assert!(store.release("rate:hb:1", "0-a").await.is_err());
    }
}
