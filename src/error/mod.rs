use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type for rategate operations
pub type Result<T> = std::result::Result<T, RateGateError>;

/// Rategate error types
#[derive(Error, Debug)]
pub enum RateGateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Counter store timed out after {0}ms")]
    StoreTimeout(u64),

    #[error("Counter store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl RateGateError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RateGateError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RateGateError::StoreTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            RateGateError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            RateGateError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RateGateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error came from the counter store layer.
    ///
    /// Store failures never surface to callers; the enforcement middleware
    /// converts them into fail-open continuations.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            RateGateError::Store(_) | RateGateError::StoreTimeout(_)
        )
    }
}

impl From<redis::RedisError> for RateGateError {
    fn from(err: redis::RedisError) -> Self {
        RateGateError::Store(err.to_string())
    }
}

impl IntoResponse for RateGateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            RateGateError::Config("test".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RateGateError::StoreTimeout(100).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            RateGateError::Store("connection refused".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_store_failure_classification() {
        assert!(RateGateError::StoreTimeout(100).is_store_failure());
        assert!(RateGateError::Store("EXEC aborted".to_string()).is_store_failure());
        assert!(!RateGateError::Config("bad yaml".to_string()).is_store_failure());
    }

    #[test]
    fn test_error_display() {
        let err = RateGateError::StoreTimeout(100);
        assert_eq!(err.to_string(), "Counter store timed out after 100ms");
    }
}
