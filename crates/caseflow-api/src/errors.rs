//! Error types for the HTTP service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use caseflow_core::webhook::DispatchError;
use caseflow_core::{EventId, SignatureError, StoreError, ValidationError};
use tracing::warn;

/// Webhook and admin handler errors with HTTP status mapping
///
/// Status conventions follow what webhook senders expect:
/// - `400 Bad Request`: the request itself is unusable; do not redeliver
/// - `401 Unauthorized`: signature or token verification failed
/// - `404 Not Found`: unknown source or event
/// - `500/503`: handler or storage failure; the sender's retry mechanism
///   should redeliver (503 carries a `Retry-After` hint)
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The `{source_name}` path segment names no known source
    #[error("Unknown webhook source: {source_name}")]
    UnknownSource { source_name: String },

    /// Signature verification rejected the notification; nothing was stored
    #[error("Signature verification failed: {0}")]
    SignatureRejected(#[from] SignatureError),

    /// Required metadata was missing or malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    /// The event was stored but its handler failed; the sender should
    /// redeliver or an operator should replay
    #[error("Event {event_id} failed processing: {error}")]
    HandlerFailed {
        event_id: EventId,
        error: String,
        retryable: bool,
    },

    /// The event store could not be reached; nothing was recorded
    #[error("Storage unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// The automation trigger has no scheduler token configured
    #[error("Automation trigger is disabled: no scheduler token configured")]
    AutomationDisabled,

    /// Bearer token missing or wrong
    #[error("Unauthorized")]
    Unauthorized,
}

impl From<DispatchError> for ApiError {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::Store(store_error) => Self::StoreUnavailable(store_error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, retry_after) = match &self {
            Self::UnknownSource { .. } => (StatusCode::NOT_FOUND, None),
            Self::SignatureRejected(_) => (StatusCode::UNAUTHORIZED, None),
            Self::InvalidRequest(_) => (StatusCode::BAD_REQUEST, None),
            Self::HandlerFailed { retryable, .. } => {
                if *retryable {
                    (StatusCode::SERVICE_UNAVAILABLE, Some(60))
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, None)
                }
            }
            Self::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, Some(30)),
            Self::AutomationDisabled => (StatusCode::SERVICE_UNAVAILABLE, None),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, None),
        };

        warn!(status = status.as_u16(), error = %self, "Request rejected");

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
