use super::types::{CheckResult, RateLimitKey};
use crate::error::{RateGateError, Result};
use crate::store::CounterStore;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Transient store failures absorbed before surfacing an error. Covers
/// optimistic-concurrency conflicts on stores that expose watch/multi/exec
/// instead of a server-side atomic primitive.
const MAX_STORE_RETRIES: u32 = 2;

/// Fixed-window rate limit checks against the shared counter store
///
/// The service counts and classifies; it never fails open. Fallback policy
/// on store failure belongs to the enforcement middleware, which is why
/// every store problem surfaces here as an error.
pub struct RateLimitService {
    store: Arc<dyn CounterStore>,
    /// Hard cap on one check's store round-trip, retries included
    timeout: Duration,
}

impl RateLimitService {
    pub fn new(store: Arc<dyn CounterStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Charge one request against `key` and classify it.
    ///
    /// The increment always lands before classification, so a denied
    /// request is still a counted observation of usage. `allowed` is
    /// `current <= effective_limit`; `remaining` never goes negative;
    /// `reset_ms` is derived from the TTL the store reports back.
    pub async fn check_limit(
        &self,
        key: &RateLimitKey,
        effective_limit: u32,
        window_secs: u64,
    ) -> Result<CheckResult> {
        let store_key = key.to_store_key();

        let sample = tokio::time::timeout(
            self.timeout,
            self.incr_with_retry(&store_key, window_secs),
        )
        .await
        .map_err(|_| RateGateError::StoreTimeout(self.timeout.as_millis() as u64))??;

        let current = sample.count;
        let allowed = current <= effective_limit as u64;
        let remaining = (effective_limit as u64).saturating_sub(current).min(u32::MAX as u64) as u32;
        let reset_ms = epoch_ms() + sample.ttl_secs * 1000;

        debug!(
            "Limit check for key {}: current={}, limit={}, allowed={}",
            store_key, current, effective_limit, allowed
        );

        Ok(CheckResult {
            allowed,
            remaining,
            reset_ms,
            current,
        })
    }

    async fn incr_with_retry(
        &self,
        store_key: &str,
        window_secs: u64,
    ) -> Result<crate::store::CounterSample> {
        let mut last_err = RateGateError::Store("retries exhausted".to_string());

        for attempt in 0..=MAX_STORE_RETRIES {
            match self.store.incr_with_expiry(store_key, window_secs).await {
                Ok(sample) => {
                    if attempt > 0 {
                        debug!("Store increment succeeded on retry {}", attempt);
                    }
                    return Ok(sample);
                }
                Err(e) if e.is_store_failure() && attempt < MAX_STORE_RETRIES => {
                    warn!(
                        "Store increment failed (attempt {}/{}): {}",
                        attempt + 1,
                        MAX_STORE_RETRIES + 1,
                        e
                    );
                    last_err = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err)
    }
}

/// Milliseconds since the Unix epoch
pub(crate) fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
