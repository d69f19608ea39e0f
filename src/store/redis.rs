use super::lua_scripts::INCR_WITH_EXPIRY_SCRIPT;
use super::{CounterSample, CounterStore};
use crate::error::{RateGateError, Result};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Script};
use tracing::debug;

/// Redis-backed shared counter store
///
/// Every handler instance talks to the same logical Redis, so counters are
/// consistent across processes. The increment-with-expiry operation runs as
/// one Lua script; Redis executes scripts atomically, which gives the same
/// guarantee a WATCH/MULTI/EXEC loop would without the conflict retries.
#[derive(Clone)]
pub struct RedisCounterStore {
    connection: ConnectionManager,
}

impl RedisCounterStore {
    /// Connect to Redis at `url`
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        Ok(Self { connection })
    }

    /// Test the connection
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING").query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr_with_expiry(&self, key: &str, window_secs: u64) -> Result<CounterSample> {
        let mut conn = self.connection.clone();
        let script = Script::new(INCR_WITH_EXPIRY_SCRIPT);

        let result: Vec<i64> = script
            .key(key)
            .arg(window_secs)
            .invoke_async(&mut conn)
            .await?;

        let sample = parse_counter_reply(&result)?;

        debug!(
            "Counter increment for key {}: count={}, ttl={}",
            key, sample.count, sample.ttl_secs
        );

        Ok(sample)
    }
}

/// Decode the `[count, ttl]` script reply. A proxy or cluster returning a
/// differently-shaped reply surfaces as a store error, not a panic.
fn parse_counter_reply(reply: &[i64]) -> Result<CounterSample> {
    match reply {
        [count, ttl, ..] => Ok(CounterSample {
            count: (*count).max(0) as u64,
            ttl_secs: (*ttl).max(0) as u64,
        }),
        _ => Err(RateGateError::Store(format!(
            "unexpected counter script reply: {:?}",
            reply
        ))),
    }
}
