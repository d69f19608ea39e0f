use super::service::{epoch_ms, RateLimitService};
use super::types::{CheckResult, RouteLimitConfig};
use crate::bypass::{BypassAuthority, BYPASS_HEADER};
use crate::events::{EventContext, EventLogger};
use crate::identity::{AuthenticatedUser, IdentityResolver};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_DENIAL_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

/// Everything the enforcement middleware needs for one protected route
#[derive(Clone)]
pub struct EnforcementState {
    service: Arc<RateLimitService>,
    resolver: Arc<IdentityResolver>,
    bypass: Arc<BypassAuthority>,
    events: EventLogger,
    /// Uppercased methods the limit applies to; empty covers every method
    methods: Vec<String>,
    config: RouteLimitConfig,
}

impl EnforcementState {
    pub fn new(
        service: Arc<RateLimitService>,
        resolver: Arc<IdentityResolver>,
        bypass: Arc<BypassAuthority>,
        events: EventLogger,
        methods: Vec<String>,
        config: RouteLimitConfig,
    ) -> Self {
        Self {
            service,
            resolver,
            bypass,
            events,
            methods: methods.into_iter().map(|m| m.to_uppercase()).collect(),
            config,
        }
    }

    /// Whether the route's limit covers this request method
    fn applies_to(&self, method: &http::Method) -> bool {
        self.methods.is_empty() || self.methods.iter().any(|m| m == method.as_str())
    }
}

/// Axum middleware enforcing the route's rate limit.
///
/// Per-request flow: bypass check, then identity resolution, then one
/// counter check under the store timeout budget. Denials short-circuit
/// with a 429; store failures release the request unlimited (fail-open).
/// The `X-RateLimit-*` headers are set on every outcome.
pub async fn enforce(
    State(state): State<EnforcementState>,
    request: Request,
    next: Next,
) -> Response {
    // Methods outside the configured list are not rate limited at all
    if !state.applies_to(request.method()) {
        return next.run(request).await;
    }

    let endpoint = format!("{} {}", request.method(), request.uri().path());

    // Extract client IP (set via ConnectInfo when served over TCP)
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    // Trusted internal callers skip the counter entirely
    let token = request
        .headers()
        .get(BYPASS_HEADER)
        .and_then(|v| v.to_str().ok());

    if state.bypass.is_bypassed(token) {
        state.events.bypass(&EventContext {
            user_id: None,
            ip: &client_ip,
            endpoint: &endpoint,
            key: "",
        });

        let response = next.run(request).await;
        // No counter was consulted; report a full window
        return with_rate_limit_headers(
            response,
            state.config.limit,
            state.config.limit,
            epoch_ms() + state.config.window_secs * 1000,
        );
    }

    let user_id = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|u| u.0.clone());

    let identity = state.resolver.resolve(user_id.as_deref(), &client_ip).await;
    let effective_limit = state.config.effective_limit(identity.role.as_deref());
    let store_key = identity.key.to_store_key();

    let ctx = EventContext {
        user_id: identity.user_id.as_deref(),
        ip: &client_ip,
        endpoint: &endpoint,
        key: &store_key,
    };

    match state
        .service
        .check_limit(&identity.key, effective_limit, state.config.window_secs)
        .await
    {
        Ok(result) if result.allowed => {
            debug!(
                "Rate limit check passed for key {}, remaining: {}",
                store_key, result.remaining
            );

            let response = next.run(request).await;
            with_rate_limit_headers(response, effective_limit, result.remaining, result.reset_ms)
        }
        Ok(result) => {
            state
                .events
                .violation(&ctx, effective_limit, state.config.window_secs);

            denial_response(&state.config, effective_limit, &result)
        }
        Err(e) => {
            // Store failure or timeout: release the request rather than
            // block on an unhealthy store. Limiting resumes once the
            // store recovers.
            state.events.fail_open(&ctx, &e.to_string());

            let response = next.run(request).await;
            with_rate_limit_headers(
                response,
                effective_limit,
                effective_limit,
                epoch_ms() + state.config.window_secs * 1000,
            )
        }
    }
}

/// Set the `X-RateLimit-*` headers on a response
fn with_rate_limit_headers(
    mut response: Response,
    limit: u32,
    remaining: u32,
    reset_ms: u64,
) -> Response {
    let headers = response.headers_mut();

    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from_str(&limit.to_string()).unwrap(),
    );
    headers.insert(
        "X-RateLimit-Remaining",
        HeaderValue::from_str(&remaining.to_string()).unwrap(),
    );
    headers.insert(
        "X-RateLimit-Reset",
        HeaderValue::from_str(&reset_ms.to_string()).unwrap(),
    );

    response
}

/// Build the 429 response for a denied request
fn denial_response(config: &RouteLimitConfig, effective_limit: u32, result: &CheckResult) -> Response {
    let retry_after = result.retry_after_secs(epoch_ms());

    let message = config
        .message
        .as_deref()
        .unwrap_or(DEFAULT_DENIAL_MESSAGE);

    let body = serde_json::json!({
        "error": message,
        "retryAfter": retry_after,
        "limit": effective_limit,
        "windowSeconds": config.window_secs,
    });

    let mut response =
        (StatusCode::TOO_MANY_REQUESTS, body.to_string()).into_response();

    response.headers_mut().insert(
        "Retry-After",
        HeaderValue::from_str(&retry_after.to_string()).unwrap(),
    );
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    with_rate_limit_headers(response, effective_limit, result.remaining, result.reset_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticRoleProvider;
    use crate::store::MemoryCounterStore;
    use std::time::Duration;

    fn route_config(message: Option<&str>) -> RouteLimitConfig {
        RouteLimitConfig {
            limit: 2,
            window_secs: 60,
            message: message.map(String::from),
            role_multipliers: None,
        }
    }

    fn denied_result() -> CheckResult {
        CheckResult {
            allowed: false,
            remaining: 0,
            reset_ms: epoch_ms() + 30_000,
            current: 3,
        }
    }

    #[test]
    fn test_denial_response_shape() {
        let response = denial_response(&route_config(None), 2, &denied_result());

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let headers = response.headers();
        assert_eq!(headers.get("X-RateLimit-Limit").unwrap(), "2");
        assert_eq!(headers.get("X-RateLimit-Remaining").unwrap(), "0");
        assert!(headers.contains_key("X-RateLimit-Reset"));
        assert!(headers.contains_key("Retry-After"));
        assert_eq!(headers.get("Content-Type").unwrap(), "application/json");
    }

    #[test]
    fn test_denial_retry_after_positive_while_window_active() {
        let response = denial_response(&route_config(None), 2, &denied_result());
        let retry: u64 = response
            .headers()
            .get("Retry-After")
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(retry > 0 && retry <= 30);
    }

    fn state_with_methods(methods: Vec<String>) -> EnforcementState {
        EnforcementState::new(
            Arc::new(RateLimitService::new(
                Arc::new(MemoryCounterStore::new()),
                Duration::from_millis(100),
            )),
            Arc::new(IdentityResolver::new(
                Arc::new(StaticRoleProvider::empty()),
                "user",
            )),
            Arc::new(BypassAuthority::disabled()),
            EventLogger::new("rategate"),
            methods,
            route_config(None),
        )
    }

    #[test]
    fn test_configured_methods_scope_enforcement() {
        let state = state_with_methods(vec!["post".to_string()]);
        assert!(state.applies_to(&http::Method::POST));
        assert!(!state.applies_to(&http::Method::GET));
    }

    #[test]
    fn test_empty_methods_cover_everything() {
        let state = state_with_methods(Vec::new());
        assert!(state.applies_to(&http::Method::GET));
        assert!(state.applies_to(&http::Method::DELETE));
    }

    #[test]
    fn test_headers_applied_to_response() {
        let response = with_rate_limit_headers(
            StatusCode::OK.into_response(),
            10,
            7,
            1_700_000_000_000,
        );

        let headers = response.headers();
        assert_eq!(headers.get("X-RateLimit-Limit").unwrap(), "10");
        assert_eq!(headers.get("X-RateLimit-Remaining").unwrap(), "7");
        assert_eq!(headers.get("X-RateLimit-Reset").unwrap(), "1700000000000");
    }
}
