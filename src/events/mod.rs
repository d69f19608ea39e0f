//! Structured event logging
//!
//! One JSON object per line on the standard log stream for the three
//! enforcement events: `internal_bypass`, `rate_limit_exceeded` and
//! `fail_open`. Emission is a synchronous write that never fails the
//! request path.

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

/// A single enforcement event, serialized as one JSON line
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementEvent<'a> {
    pub level: &'static str,
    pub service: &'a str,
    pub event: &'static str,
    /// Authenticated user id, or "anonymous"
    pub user_id: &'a str,
    pub ip: &'a str,
    /// `METHOD path` of the protected route
    pub endpoint: &'a str,
    /// Counter key the event concerns; empty for bypass events, where
    /// identity resolution is skipped entirely
    #[serde(skip_serializing_if = "str::is_empty")]
    pub key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    /// RFC 3339 timestamp
    pub timestamp: String,
}

/// Context shared by every event for one request
#[derive(Debug, Clone)]
pub struct EventContext<'a> {
    pub user_id: Option<&'a str>,
    pub ip: &'a str,
    /// `METHOD path`
    pub endpoint: &'a str,
    pub key: &'a str,
}

/// Emits enforcement events for one service
#[derive(Debug, Clone)]
pub struct EventLogger {
    service: String,
}

impl EventLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// A trusted internal caller skipped rate limiting
    pub fn bypass(&self, ctx: &EventContext<'_>) {
        let event = self.event("info", "internal_bypass", ctx);
        if let Ok(line) = serde_json::to_string(&event) {
            info!("{}", line);
        }
    }

    /// A caller exceeded its effective cap and was denied
    pub fn violation(&self, ctx: &EventContext<'_>, limit: u32, window_seconds: u64) {
        let mut event = self.event("warn", "rate_limit_exceeded", ctx);
        event.limit = Some(limit);
        event.window_seconds = Some(window_seconds);
        if let Ok(line) = serde_json::to_string(&event) {
            warn!("{}", line);
        }
    }

    /// The store failed or timed out and the request was released unlimited
    pub fn fail_open(&self, ctx: &EventContext<'_>, error_text: &str) {
        let mut event = self.event("error", "fail_open", ctx);
        event.error = Some(error_text);
        if let Ok(line) = serde_json::to_string(&event) {
            error!("{}", line);
        }
    }

    fn event<'a>(
        &'a self,
        level: &'static str,
        name: &'static str,
        ctx: &EventContext<'a>,
    ) -> EnforcementEvent<'a> {
        EnforcementEvent {
            level,
            service: &self.service,
            event: name,
            user_id: ctx.user_id.unwrap_or("anonymous"),
            ip: ctx.ip,
            endpoint: ctx.endpoint,
            key: ctx.key,
            limit: None,
            window_seconds: None,
            error: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}
