use super::{CounterSample, CounterStore};
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// One fixed window for a key
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    expires_at: Instant,
}

/// In-memory counter store
///
/// Same semantics as the Redis store but scoped to one process: counters
/// live in a DashMap and expire lazily when the next increment finds the
/// window deadline in the past. Intended for tests and single-instance
/// deployments; it provides no cross-process coordination.
#[derive(Default)]
pub struct MemoryCounterStore {
    windows: DashMap<String, Window>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live counter keys (for tests/monitoring)
    pub fn active_keys(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr_with_expiry(&self, key: &str, window_secs: u64) -> Result<CounterSample> {
        let now = Instant::now();
        let window_len = Duration::from_secs(window_secs);

        // The entry guard holds the shard lock, making the
        // read-modify-write atomic with respect to other handlers.
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!("Opening counter window for key: {}", key);
                Window {
                    count: 0,
                    expires_at: now + window_len,
                }
            });

        if entry.expires_at <= now {
            // Previous window expired; this increment opens a fresh one
            entry.count = 1;
            entry.expires_at = now + window_len;
        } else {
            entry.count += 1;
        }

        let ttl_secs = entry
            .expires_at
            .saturating_duration_since(now)
            .as_secs()
            .max(1);

        Ok(CounterSample {
            count: entry.count,
            ttl_secs,
        })
    }
}
