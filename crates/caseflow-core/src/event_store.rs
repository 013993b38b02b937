//! # Event Store
//!
//! Durable append-only record of every inbound webhook notification.
//!
//! The store is the foundation for idempotency and replay: the raw payload
//! is persisted verbatim before any parsing so a failed event can be
//! re-processed even after handler logic changes, and the
//! `(source, external_event_id)` uniqueness rule is enforced at write time
//! so duplicate delivery never re-triggers a handler.

use crate::{EventId, EventSource, Timestamp};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Types
// ============================================================================

/// One stored inbound webhook notification
///
/// Events are created once on first receipt and never deleted; the
/// `processed`/`error` pair is rewritten once per processing attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Store-assigned identifier
    pub id: EventId,

    /// Origin system
    pub source: EventSource,

    /// Source-defined event type string (e.g. "invoice.paid", "push")
    pub event_type: String,

    /// Sender-assigned delivery or event identifier, unique per source
    pub external_event_id: String,

    /// Verbatim received body, stored before any parsing
    pub raw_payload: Bytes,

    /// Whether the most recent processing attempt succeeded
    pub processed: bool,

    /// When the event was successfully processed
    pub processed_at: Option<Timestamp>,

    /// Error message from the most recent failed attempt
    pub error: Option<String>,

    /// Receipt timestamp
    pub created_at: Timestamp,
}

/// A notification about to be persisted for the first time
#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub source: EventSource,
    pub event_type: String,
    pub external_event_id: String,
    pub raw_payload: Bytes,
}

impl NewWebhookEvent {
    /// Materialize the stored record, assigning an ID and receipt time
    pub fn into_event(self) -> WebhookEvent {
        WebhookEvent {
            id: EventId::new(),
            source: self.source,
            event_type: self.event_type,
            external_event_id: self.external_event_id,
            raw_payload: self.raw_payload,
            processed: false,
            processed_at: None,
            error: None,
            created_at: Timestamp::now(),
        }
    }
}

/// Outcome of an insert-if-absent write
///
/// `Duplicate` is the store-level signal that the `(source,
/// external_event_id)` pair already exists; callers treat it as an
/// idempotent acknowledgement, never as a failure. A concurrent insert that
/// loses the uniqueness race must surface here as well.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    /// The event was stored; processing should proceed
    Inserted(WebhookEvent),

    /// The pair already exists; no new row was written
    Duplicate { existing: EventId },
}

/// Filter for the event listing endpoint
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub source: Option<EventSource>,
    pub processed: Option<bool>,
    pub limit: Option<usize>,
}

impl EventFilter {
    /// Default page size for event listings
    pub const DEFAULT_LIMIT: usize = 50;

    /// Hard cap on page size regardless of the requested limit
    pub const MAX_LIMIT: usize = 200;

    /// Effective page size after applying the default and the hard cap
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .min(Self::MAX_LIMIT)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors from the storage collaborator
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Store operation failed: {message}")]
    OperationFailed { message: String },

    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },
}

impl StoreError {
    /// Check if the error is transient and the operation worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::OperationFailed { .. } => true,
            Self::NotFound { .. } => false,
        }
    }
}

// ============================================================================
// Store Contract
// ============================================================================

/// Durable storage for inbound webhook events
///
/// Implementations must make `insert` atomic with respect to the
/// `(source, external_event_id)` uniqueness check: two concurrent inserts
/// of the same pair must yield exactly one `Inserted` and one `Duplicate`.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert the event if its `(source, external_event_id)` pair is absent
    async fn insert(&self, event: NewWebhookEvent) -> Result<InsertOutcome, StoreError>;

    /// Fetch a stored event by ID
    async fn get(&self, id: &EventId) -> Result<Option<WebhookEvent>, StoreError>;

    /// Record a successful processing attempt
    async fn mark_processed(&self, id: &EventId, at: Timestamp) -> Result<(), StoreError>;

    /// Record a failed processing attempt with its error message
    async fn mark_failed(&self, id: &EventId, error: &str) -> Result<(), StoreError>;

    /// List stored events, newest first, bounded by the filter's limit
    async fn list(&self, filter: &EventFilter) -> Result<Vec<WebhookEvent>, StoreError>;
}

#[cfg(test)]
#[path = "event_store_tests.rs"]
mod tests;
