pub mod bypass;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod limiter;
pub mod store;

use crate::bypass::BypassAuthority;
use crate::config::{Config, RouteConfig};
use crate::error::Result;
use crate::events::EventLogger;
use crate::identity::{IdentityResolver, RoleProvider};
use crate::limiter::{EnforcementState, RateLimitService};
use crate::store::{CounterStore, MemoryCounterStore, RedisCounterStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Assembled rate limiting subsystem
///
/// Built once at startup from a [`Config`] and handed to the application,
/// which attaches per-route enforcement via
/// `axum::middleware::from_fn_with_state(gate.enforcement_for(path)?, limiter::enforce)`.
pub struct RateGate {
    service: Arc<RateLimitService>,
    resolver: Arc<IdentityResolver>,
    bypass: Arc<BypassAuthority>,
    events: EventLogger,
    routes: HashMap<String, RouteConfig>,
}

impl RateGate {
    /// Build from configuration, connecting to Redis when a store URL is
    /// configured and falling back to the in-memory store otherwise.
    pub async fn from_config(config: &Config, roles: Arc<dyn RoleProvider>) -> Result<Self> {
        let store: Arc<dyn CounterStore> = match &config.store.url {
            Some(url) => {
                info!("Connecting to counter store at {}", url);
                let store = RedisCounterStore::connect(url).await?;
                store.ping().await?;
                Arc::new(store)
            }
            None => {
                info!("No store URL configured, using in-memory counters");
                Arc::new(MemoryCounterStore::new())
            }
        };

        Self::with_store(config, store, roles)
    }

    /// Build with an explicit store (used by tests and embedders that
    /// manage their own store client)
    pub fn with_store(
        config: &Config,
        store: Arc<dyn CounterStore>,
        roles: Arc<dyn RoleProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let service = Arc::new(RateLimitService::new(
            store,
            Duration::from_millis(config.store.timeout_ms),
        ));
        let resolver = Arc::new(IdentityResolver::new(roles, config.default_role.clone()));
        let bypass = Arc::new(BypassAuthority::new(
            config.bypass.as_ref().map(|b| b.secret.clone()),
        ));
        let events = EventLogger::new(config.service_name.clone());

        let routes = config
            .routes
            .iter()
            .map(|r| (r.path.clone(), r.clone()))
            .collect();

        Ok(Self {
            service,
            resolver,
            bypass,
            events,
            routes,
        })
    }

    /// Enforcement state for one configured route, or None if the path has
    /// no rate limit configured
    pub fn enforcement_for(&self, path: &str) -> Option<EnforcementState> {
        self.routes.get(path).map(|route| {
            EnforcementState::new(
                self.service.clone(),
                self.resolver.clone(),
                self.bypass.clone(),
                self.events.clone(),
                route.methods.clone(),
                route.limit.clone(),
            )
        })
    }

    /// Configured route paths
    pub fn route_paths(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rategate=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticRoleProvider;

    #[tokio::test]
    async fn test_gate_builds_from_config() {
        let config = Config::from_yaml(
            r#"
routes:
  - path: "/api/attempts"
    limit: 10
    window_secs: 60
"#,
        )
        .unwrap();

        let gate = RateGate::with_store(
            &config,
            Arc::new(MemoryCounterStore::new()),
            Arc::new(StaticRoleProvider::empty()),
        )
        .unwrap();

        assert!(gate.enforcement_for("/api/attempts").is_some());
        assert!(gate.enforcement_for("/api/unknown").is_none());
    }

    #[tokio::test]
    async fn test_gate_rejects_invalid_config() {
        let config = Config::from_yaml(
            r#"
routes:
  - path: "/api/attempts"
    limit: 0
    window_secs: 60
"#,
        )
        .unwrap();

        let result = RateGate::with_store(
            &config,
            Arc::new(MemoryCounterStore::new()),
            Arc::new(StaticRoleProvider::empty()),
        );

        assert!(result.is_err());
    }
}
