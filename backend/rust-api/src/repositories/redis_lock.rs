use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use uuid::Uuid;

use super::{CompletionLocks, LockToken, StoreResult};

/// Deletes the key only while it still holds the caller's token.
const RELEASE_SCRIPT: &str = r#"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
    return 0
"#;

/// Per-key locks built on `SET key token NX PX ttl`.
pub struct RedisLocks {
    redis: ConnectionManager,
}

impl RedisLocks {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl CompletionLocks for RedisLocks {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.redis.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    async fn try_acquire(&self, key: &str, ttl: Duration) -> StoreResult<Option<LockToken>> {
        let mut conn = self.redis.clone();
        let token = Uuid::new_v4().to_string();

        let acquired: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;

        Ok(acquired.map(|_| LockToken {
            key: key.to_string(),
            token,
        }))
    }

    async fn release(&self, token: &LockToken) -> StoreResult<()> {
        let mut conn = self.redis.clone();
        let released: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(&token.key)
            .arg(&token.token)
            .invoke_async(&mut conn)
            .await?;

        if released == 0 {
            tracing::warn!(key = %token.key, "Lock expired before release");
        }
        Ok(())
    }
}
