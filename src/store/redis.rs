//! Redis-backed counter store shared by every router instance.
//!
//! The whole sliding-window check runs as one Lua script, so concurrent
//! instances see a single count per key.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};

use super::{bucket_ttl_ms, window_position, CounterStore, StoreError, WindowCount};

const SLIDING_WINDOW_SCRIPT: &str = r#"
local current_key = KEYS[1]
local previous_key = KEYS[2]
local limit = tonumber(ARGV[1])
local now = tonumber(ARGV[2])
local window = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

local current = tonumber(redis.call("GET", current_key) or "0")
-- the first slice has no predecessor and is passed as its own previous key
local previous = 0
if previous_key ~= current_key then
  previous = tonumber(redis.call("GET", previous_key) or "0")
end
local elapsed = (now % window) / window
local used = current + math.floor(previous * (1 - elapsed))

if used >= limit then
  return {0, used}
end

redis.call("INCR", current_key)
redis.call("PEXPIRE", current_key, ttl)
return {1, used + 1}
"#;

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    script: Script,
}

impl RedisStore {
    /// Connect to Redis. The connection manager reconnects on its own after
    /// transient failures.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        tracing::info!(url = %redact(url), "Connected to rate-limit store");
        Ok(Self::with_connection(connection))
    }

    pub fn with_connection(connection: ConnectionManager) -> Self {
        Self {
            connection,
            script: Script::new(SLIDING_WINDOW_SCRIPT),
        }
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn sliding_window(
        &self,
        key: &str,
        limit: u64,
        window_ms: u64,
        now_ms: u64,
    ) -> Result<WindowCount, StoreError> {
        let (slice, reset_at_ms, _) = window_position(now_ms, window_ms);
        let mut connection = self.connection.clone();

        let (admitted, used): (i64, i64) = self
            .script
            .key(format!("{}:{}", key, slice))
            .key(format!("{}:{}", key, slice.saturating_sub(1)))
            .arg(limit)
            .arg(now_ms)
            .arg(window_ms)
            .arg(bucket_ttl_ms(window_ms))
            .invoke_async(&mut connection)
            .await?;

        if used < 0 {
            return Err(StoreError::Protocol(format!("negative count {}", used)));
        }

        Ok(WindowCount {
            admitted: admitted == 1,
            used: used as u64,
            reset_at_ms,
        })
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Strip credentials from a connection URL before logging it.
fn redact(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}
