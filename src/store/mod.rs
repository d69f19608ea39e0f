//! Shared counter store
//!
//! Thin client layer over the key-value store that holds the per-key
//! request counters. The single operation is an atomic
//! "increment and conditionally set TTL": the increment, the first-write
//! TTL assignment and the TTL read-back happen as one indivisible step so
//! that concurrent handlers across instances never lose an increment.
//!
//! Two implementations:
//!
//! - [`RedisCounterStore`]: distributed, executes the operation as a
//!   single server-side Lua script
//! - [`MemoryCounterStore`]: in-process, for tests and single-instance
//!   deployments

pub mod lua_scripts;
pub mod memory;
pub mod redis;

pub use memory::MemoryCounterStore;
pub use redis::RedisCounterStore;

use crate::error::Result;
use async_trait::async_trait;

/// Counter state read back from one atomic increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSample {
    /// Count after this increment; 1 means this request opened the window
    pub count: u64,
    /// Seconds until the key expires and the window restarts
    pub ttl_secs: u64,
}

/// Atomic increment-with-expiry against the shared store
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key` by 1; if the increment created the key, set its TTL
    /// to `window_secs`. Returns the post-increment count and remaining TTL.
    ///
    /// Key absence is equivalent to count 0, so the first call of a window
    /// returns count 1 with a full TTL.
    async fn incr_with_expiry(&self, key: &str, window_secs: u64) -> Result<CounterSample>;
}
