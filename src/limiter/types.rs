use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Identifier used when a request carries no valid identity at all
/// (e.g. a malformed source address). All such traffic shares one bucket.
pub const ANONYMOUS_BUCKET: &str = "anonymous";

/// Rate limit scope - what kind of identity a counter belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitScope {
    /// Counter keyed by authenticated user id
    User,
    /// Counter keyed by client IP address
    Ip,
}

/// Rate limit key: one counter per (scope, identifier) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    /// The scope type
    pub scope: RateLimitScope,
    /// The identifier (user id or IP literal)
    pub identifier: String,
}

impl RateLimitKey {
    /// Create a user-scoped key
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            scope: RateLimitScope::User,
            identifier: id.into(),
        }
    }

    /// Create an IP-scoped key
    pub fn ip(addr: impl Into<String>) -> Self {
        Self {
            scope: RateLimitScope::Ip,
            identifier: addr.into(),
        }
    }

    /// The shared bucket for requests with no usable identity
    pub fn anonymous() -> Self {
        Self::ip(ANONYMOUS_BUCKET)
    }

    /// Convert to a store key
    pub fn to_store_key(&self) -> String {
        let scope = match self.scope {
            RateLimitScope::User => "user",
            RateLimitScope::Ip => "ip",
        };
        format!("rategate:{}:{}", scope, self.identifier)
    }
}

/// Per-route rate limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteLimitConfig {
    /// Base request cap per window
    pub limit: u32,
    /// Window length in seconds; doubles as the counter TTL
    pub window_secs: u64,
    /// Custom message for 429 bodies
    #[serde(default)]
    pub message: Option<String>,
    /// Per-role scalar applied to the base cap for authenticated callers
    #[serde(default)]
    pub role_multipliers: Option<HashMap<String, f64>>,
}

impl RouteLimitConfig {
    /// Get the window as a Duration
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Effective cap for a caller: `floor(limit * multiplier)` when the
    /// role has a configured multiplier, clamped to at least 1 so a
    /// fractional multiplier can never deny a role outright. Anonymous
    /// (IP-scoped) traffic never carries a role and always gets the base
    /// cap.
    pub fn effective_limit(&self, role: Option<&str>) -> u32 {
        match (role, &self.role_multipliers) {
            (Some(role), Some(multipliers)) => match multipliers.get(role) {
                Some(m) => ((self.limit as f64 * m).floor() as u32).max(1),
                None => self.limit,
            },
            _ => self.limit,
        }
    }
}

/// Outcome of one counter check
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Whether the request is within the cap
    pub allowed: bool,
    /// Remaining requests in the current window (never negative)
    pub remaining: u32,
    /// When the window resets, epoch milliseconds
    pub reset_ms: u64,
    /// Observed count after this request's increment
    pub current: u64,
}

impl CheckResult {
    /// Seconds until the window resets, rounded up, never negative.
    /// Used for the `Retry-After` header on denials.
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        self.reset_ms.saturating_sub(now_ms).div_ceil(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_to_store_key() {
        let key = RateLimitKey::ip("192.168.1.1");
        assert_eq!(key.to_store_key(), "rategate:ip:192.168.1.1");

        let key = RateLimitKey::user("user123");
        assert_eq!(key.to_store_key(), "rategate:user:user123");

        let key = RateLimitKey::anonymous();
        assert_eq!(key.to_store_key(), "rategate:ip:anonymous");
    }

    #[test]
    fn test_effective_limit_with_multiplier() {
        let config = RouteLimitConfig {
            limit: 10,
            window_secs: 60,
            message: None,
            role_multipliers: Some(HashMap::from([
                ("moderator".to_string(), 2.0),
                ("trusted".to_string(), 1.5),
            ])),
        };

        assert_eq!(config.effective_limit(Some("moderator")), 20);
        assert_eq!(config.effective_limit(Some("trusted")), 15);
        // Role without a configured multiplier gets the base cap
        assert_eq!(config.effective_limit(Some("player")), 10);
        // Anonymous traffic always gets the base cap
        assert_eq!(config.effective_limit(None), 10);
    }

    #[test]
    fn test_effective_limit_floors() {
        let config = RouteLimitConfig {
            limit: 7,
            window_secs: 60,
            message: None,
            role_multipliers: Some(HashMap::from([("trusted".to_string(), 1.5)])),
        };

        // floor(7 * 1.5) = 10
        assert_eq!(config.effective_limit(Some("trusted")), 10);
    }

    #[test]
    fn test_effective_limit_never_reaches_zero() {
        let config = RouteLimitConfig {
            limit: 10,
            window_secs: 60,
            message: None,
            role_multipliers: Some(HashMap::from([("restricted".to_string(), 0.05)])),
        };

        // floor(10 * 0.05) = 0 would deny the role outright; clamp to 1
        assert_eq!(config.effective_limit(Some("restricted")), 1);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let result = CheckResult {
            allowed: false,
            remaining: 0,
            reset_ms: 10_500,
            current: 3,
        };

        assert_eq!(result.retry_after_secs(10_000), 1);
        assert_eq!(result.retry_after_secs(9_000), 2);
        // Reset already passed
        assert_eq!(result.retry_after_secs(11_000), 0);
    }
}
