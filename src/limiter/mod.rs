//! Fixed-window rate limiting
//!
//! The counting core and its enforcement middleware:
//!
//! - **Fixed window counter**: one store key per caller identity whose TTL
//!   defines the window boundary; the count resets when the key expires
//! - **Distributed by construction**: all instances share one counter
//!   store, so correctness holds across process boundaries with no
//!   in-process locks
//! - **Fail-open**: a slow or unavailable store releases requests instead
//!   of blocking them
//!
//! # Example
//!
//! ```rust,no_run
//! use rategate::limiter::{types::RateLimitKey, RateLimitService};
//! use rategate::store::MemoryCounterStore;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MemoryCounterStore::new());
//!     let service = RateLimitService::new(store, Duration::from_millis(100));
//!
//!     let key = RateLimitKey::user("u42");
//!     let result = service.check_limit(&key, 10, 60).await.unwrap();
//!     assert!(result.allowed);
//! }
//! ```

pub mod middleware;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use middleware::{enforce, EnforcementState};
pub use service::RateLimitService;
pub use types::{CheckResult, RateLimitKey, RateLimitScope, RouteLimitConfig};
