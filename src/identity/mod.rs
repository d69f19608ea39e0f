//! Identity and role resolution
//!
//! Decides which counter a request charges against and which role (if any)
//! scales its cap. Authenticated callers get a per-user key; everyone else
//! is keyed by source IP, with malformed addresses collapsing into one
//! shared anonymous bucket instead of failing the request.

use crate::limiter::types::RateLimitKey;
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

/// Authenticated user id, attached to request extensions by the
/// identity/session layer upstream of the enforcement middleware.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

/// External role lookup for authenticated users
#[async_trait]
pub trait RoleProvider: Send + Sync {
    /// Role string for `user_id`, or None if the user has no role record
    async fn role_for(&self, user_id: &str) -> Option<String>;
}

/// Static role table, for tests and single-tenant deployments
#[derive(Default)]
pub struct StaticRoleProvider {
    roles: HashMap<String, String>,
}

impl StaticRoleProvider {
    pub fn new(roles: HashMap<String, String>) -> Self {
        Self { roles }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleProvider for StaticRoleProvider {
    async fn role_for(&self, user_id: &str) -> Option<String> {
        self.roles.get(user_id).cloned()
    }
}

/// Resolved caller identity: the counter key plus the role that may scale
/// the caller's cap. IP-scoped traffic never carries a role.
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub key: RateLimitKey,
    pub role: Option<String>,
    /// User id for event logging, None for anonymous traffic
    pub user_id: Option<String>,
}

/// Resolver producing `(RateLimitKey, role)` per request
pub struct IdentityResolver {
    roles: Arc<dyn RoleProvider>,
    /// Role assumed for authenticated users the provider has no record for
    default_role: String,
}

impl IdentityResolver {
    pub fn new(roles: Arc<dyn RoleProvider>, default_role: impl Into<String>) -> Self {
        Self {
            roles,
            default_role: default_role.into(),
        }
    }

    /// Resolve the counter key and role for a request.
    ///
    /// Authenticated user id wins over source address. A source address
    /// that is not a well-formed IPv4/IPv6 literal falls back to the
    /// shared anonymous bucket rather than erroring.
    pub async fn resolve(&self, user_id: Option<&str>, remote_addr: &str) -> ResolvedIdentity {
        if let Some(id) = user_id {
            let role = self
                .roles
                .role_for(id)
                .await
                .unwrap_or_else(|| self.default_role.clone());

            return ResolvedIdentity {
                key: RateLimitKey::user(id),
                role: Some(role),
                user_id: Some(id.to_string()),
            };
        }

        let key = match remote_addr.parse::<IpAddr>() {
            Ok(addr) => RateLimitKey::ip(addr.to_string()),
            Err(_) => {
                debug!("Malformed source address {:?}, using anonymous bucket", remote_addr);
                RateLimitKey::anonymous()
            }
        };

        ResolvedIdentity {
            key,
            role: None,
            user_id: None,
        }
    }
}
