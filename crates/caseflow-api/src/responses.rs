//! Response types and query parameters for the API.

use caseflow_core::{EventId, EventSource, Timestamp, WebhookEvent};
use serde::{Deserialize, Serialize};

// ============================================================================
// Response Types
// ============================================================================

/// Webhook intake response
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub event_id: EventId,
    pub status: String,
    pub message: String,
}

/// One entry of the webhook introspection listing
#[derive(Debug, Serialize)]
pub struct WebhookEndpointInfo {
    pub source: EventSource,
    pub endpoint: String,
    pub supported_events: Vec<String>,
    /// "active" when a signing secret is configured, "missing_secret"
    /// otherwise (the endpoint rejects everything until one is set)
    pub status: String,
}

/// Retry endpoint response
#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub event_id: String,
    pub status: String,
    pub message: String,
}

/// Event listing response
#[derive(Debug, Serialize)]
pub struct EventListResponse {
    pub events: Vec<EventSummary>,
    pub count: usize,
}

/// Stored event summary for operator triage
///
/// The raw payload is deliberately omitted from listings; it is available
/// through replay, not through the list view.
#[derive(Debug, Serialize)]
pub struct EventSummary {
    pub id: EventId,
    pub source: EventSource,
    pub event_type: String,
    pub external_event_id: String,
    pub processed: bool,
    pub processed_at: Option<Timestamp>,
    pub error: Option<String>,
    pub created_at: Timestamp,
}

impl From<WebhookEvent> for EventSummary {
    fn from(event: WebhookEvent) -> Self {
        Self {
            id: event.id,
            source: event.source,
            event_type: event.event_type,
            external_event_id: event.external_event_id,
            processed: event.processed,
            processed_at: event.processed_at,
            error: event.error,
            created_at: event.created_at,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Timestamp,
    pub version: String,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: Timestamp,
}

// ============================================================================
// Query Parameter Types
// ============================================================================

/// Parameters for the event listing endpoint
#[derive(Debug, Default, Deserialize)]
pub struct EventListParams {
    pub source: Option<String>,
    pub processed: Option<bool>,
    pub limit: Option<usize>,
}
