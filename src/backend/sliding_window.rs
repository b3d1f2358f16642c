//! # Redis Sliding-Window Backend
//!
//! True sliding windows via a sorted set per counter key: each request is
//! logged at its arrival time, stale entries older than the window are
//! trimmed before counting, and a denial reports the wait until the
//! oldest logged entry ages out. Grounded on the original source's
//! `backends/slidingredis.py` Lua script (`ZREMRANGEBYSCORE`/`ZCARD`/`ZADD`),
//! generalized here to serve both [`crate::rule::FixedRule`] and
//! [`crate::rule::CustomRule`] windows via a flat ARGV encoding (the
//! original only generalized its sliding backend for the fixed-bucket
//! case), and on the `redis::Script` invocation style shown in the wider
//! pack's Redis-backed rate limiters.

use std::sync::OnceLock;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};

use super::{blocking_key, Backend};
use crate::error::RateWallError;
use crate::rule::Rule;

/// `KEYS[1]` is the blocking key; `KEYS[2..]` are one sorted-set key per
/// ruleset window, in order. `ARGV[1]` is `block_time` (`0` disables
/// blocking). `ARGV[2..]` is `limit, window_seconds` pairs, one per
/// counter key, in the same order as `KEYS[2..]`.
///
/// Unlike the fixed-window script, every window is evaluated (no early
/// `break`): the sliding-window contract reports the *longest* wait among
/// all exhausted windows, not just the first one encountered.
const SCRIPT_SOURCE: &str = r#"
local blocking_key = KEYS[1]
local block_time = tonumber(ARGV[1])

local block_ttl = redis.call('TTL', blocking_key)
if block_ttl and block_ttl > 0 then
    return block_ttl
end

local time = redis.call('TIME')
local now_us = tonumber(time[1]) * 1000000 + tonumber(time[2])

local retry_after = 0

for i = 2, #KEYS do
    local argv_base = (i - 2) * 2 + 2
    local limit = tonumber(ARGV[argv_base])
    local window = tonumber(ARGV[argv_base + 1])
    local window_us = window * 1000000
    local key = KEYS[i]

    redis.call('ZREMRANGEBYSCORE', key, 0, now_us - window_us)
    local count = redis.call('ZCARD', key)

    if count < limit then
        redis.call('ZADD', key, now_us, now_us .. '-' .. i)
        redis.call('EXPIRE', key, window)
    else
        local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
        local oldest_score = tonumber(oldest[2])
        local wait_us = oldest_score + window_us - now_us
        local wait_secs = math.ceil(wait_us / 1000000)
        if wait_secs < 1 then
            wait_secs = 1
        end
        if wait_secs > retry_after then
            retry_after = wait_secs
        end
    end
end

if retry_after > 0 and block_time > 0 then
    redis.call('SET', blocking_key, 1, 'EX', block_time)
    retry_after = block_time
end

return retry_after
"#;

fn script() -> &'static Script {
    static SCRIPT: OnceLock<Script> = OnceLock::new();
    SCRIPT.get_or_init(|| Script::new(SCRIPT_SOURCE))
}

/// Redis-backed sliding-window rate-limiting backend.
pub struct SlidingWindowBackend {
    conn: ConnectionManager,
}

impl SlidingWindowBackend {
    /// Opens a connection to `redis_url` and wraps it in a connection manager.
    pub async fn connect(redis_url: &str) -> Result<Self, RateWallError> {
        let client = Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    /// Wraps an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Backend for SlidingWindowBackend {
    async fn retry_after(&self, path: &str, user: &str, rule: &Rule) -> Result<u64, RateWallError> {
        let windows = rule.ruleset(path, user)?;
        if windows.is_empty() {
            return Ok(0);
        }

        let mut invocation = script().prepare_invoke();
        invocation = invocation.key(blocking_key(user));
        for window in &windows {
            invocation = invocation.key(window.key.clone());
        }
        invocation = invocation.arg(rule.block_time().unwrap_or(0));
        for window in &windows {
            invocation = invocation.arg(window.limit).arg(window.window_seconds);
        }

        let mut conn = self.conn.clone();
        let retry_after: u64 = invocation.invoke_async(&mut conn).await?;
        Ok(retry_after)
    }
}
