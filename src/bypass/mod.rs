//! Bypass authority
//!
//! Trusted internal callers (health probes, service-to-service traffic)
//! present a shared-secret token in the `X-Internal-Token` header and skip
//! rate limiting entirely. Bypassed requests never touch the counter store.

use secrecy::{ExposeSecret, Secret};

/// Header carrying the internal bypass token
pub const BYPASS_HEADER: &str = "X-Internal-Token";

/// Checks presented tokens against the operator-configured secret
pub struct BypassAuthority {
    /// None disables bypass entirely
    secret: Option<Secret<String>>,
}

impl BypassAuthority {
    /// Build from the configured secret; empty strings count as unconfigured
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()).map(Secret::new),
        }
    }

    pub fn disabled() -> Self {
        Self { secret: None }
    }

    /// True only on an exact byte match between the presented token and the
    /// configured secret. A missing or empty token, or an unconfigured
    /// secret, never grants bypass.
    pub fn is_bypassed(&self, provided: Option<&str>) -> bool {
        match (&self.secret, provided) {
            (Some(secret), Some(token)) if !token.is_empty() => {
                token.as_bytes() == secret.expose_secret().as_bytes()
            }
            _ => false,
        }
    }
}
