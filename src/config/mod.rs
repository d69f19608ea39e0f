use crate::error::{RateGateError, Result};
use crate::limiter::types::RouteLimitConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main rategate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Shared counter store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Internal bypass secret; absent disables bypass entirely
    #[serde(default)]
    pub bypass: Option<BypassConfig>,
    /// Service name stamped on enforcement events
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Role assumed for authenticated users with no role record
    #[serde(default = "default_role")]
    pub default_role: String,
    /// Protected route definitions
    pub routes: Vec<RouteConfig>,
}

/// Counter store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Redis connection URL; absent selects the in-memory store
    #[serde(default)]
    pub url: Option<String>,
    /// Budget for one limit check's store round-trip, in milliseconds.
    /// On expiry the request is released unlimited (fail-open).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Bypass token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BypassConfig {
    /// Shared secret matched against the `X-Internal-Token` header
    pub secret: String,
}

/// One protected route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Route path (e.g., "/api/attempts")
    pub path: String,
    /// HTTP methods the limit applies to; empty covers every method.
    /// Requests with other methods pass through unlimited.
    #[serde(default)]
    pub methods: Vec<String>,
    /// The rate limit enforced on this route
    #[serde(flatten)]
    pub limit: RouteLimitConfig,
}

fn default_timeout_ms() -> u64 {
    100
}

fn default_service_name() -> String {
    "rategate".to_string()
}

fn default_role() -> String {
    "user".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RateGateError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| RateGateError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.store.timeout_ms == 0 {
            return Err(RateGateError::Config(
                "Store timeout must be > 0".to_string(),
            ));
        }

        for route in &self.routes {
            if route.path.is_empty() {
                return Err(RateGateError::Config(
                    "Route path cannot be empty".to_string(),
                ));
            }

            for method in &route.methods {
                let method_upper = method.to_uppercase();
                if !["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"]
                    .contains(&method_upper.as_str())
                {
                    return Err(RateGateError::Config(format!(
                        "Invalid HTTP method '{}' for route: {}",
                        method, route.path
                    )));
                }
            }

            if route.limit.limit == 0 {
                return Err(RateGateError::Config(format!(
                    "Rate limit must be > 0 for route: {}",
                    route.path
                )));
            }
            if route.limit.window_secs == 0 {
                return Err(RateGateError::Config(format!(
                    "Rate limit window must be > 0 for route: {}",
                    route.path
                )));
            }

            if let Some(multipliers) = &route.limit.role_multipliers {
                for (role, multiplier) in multipliers {
                    if *multiplier <= 0.0 || !multiplier.is_finite() {
                        return Err(RateGateError::Config(format!(
                            "Role multiplier for '{}' must be a positive number on route: {}",
                            role, route.path
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let yaml = r#"
store:
  url: "redis://localhost:6379"
  timeout_ms: 100

bypass:
  secret: "secret123"

routes:
  - path: "/api/attempts"
    methods: ["POST"]
    limit: 10
    window_secs: 60
    message: "Slow down."
    role_multipliers:
      moderator: 2.0
  - path: "/api/leaderboard"
    limit: 100
    window_secs: 60
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.store.timeout_ms, 100);
        assert_eq!(config.bypass.as_ref().unwrap().secret, "secret123");
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[0].limit.limit, 10);
        assert_eq!(config.routes[0].limit.message.as_deref(), Some("Slow down."));
        assert_eq!(
            config.routes[0]
                .limit
                .role_multipliers
                .as_ref()
                .unwrap()
                .get("moderator"),
            Some(&2.0)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        let yaml = r#"
routes: []
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.store.timeout_ms, 100);
        assert!(config.store.url.is_none());
        assert!(config.bypass.is_none());
        assert_eq!(config.service_name, "rategate");
        assert_eq!(config.default_role, "user");
    }

    #[test]
    fn test_validate_zero_limit() {
        let yaml = r#"
routes:
  - path: "/api/test"
    limit: 0
    window_secs: 60
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_window() {
        let yaml = r#"
routes:
  - path: "/api/test"
    limit: 10
    window_secs: 0
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_invalid_method() {
        let yaml = r#"
routes:
  - path: "/api/test"
    methods: ["INVALID"]
    limit: 10
    window_secs: 60
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_multiplier() {
        let yaml = r#"
routes:
  - path: "/api/test"
    limit: 10
    window_secs: 60
    role_multipliers:
      moderator: -1.0
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert!(config.validate().is_err());
    }
}
