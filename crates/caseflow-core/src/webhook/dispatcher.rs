//! # Webhook Dispatcher
//!
//! Receives a verified notification, deduplicates it against the event
//! store, persists it, and invokes the source's event handler, recording
//! the outcome back on the stored event.
//!
//! The write pattern is fixed: exactly one store write before handler
//! invocation (the insert) and exactly one after (`mark_processed` or
//! `mark_failed`). The handler's own entity mutations commit independently,
//! so handlers are written to converge under re-invocation.

use crate::event_store::{EventStore, InsertOutcome, NewWebhookEvent, StoreError, WebhookEvent};
use crate::handlers::HandlerRegistry;
use crate::{EventId, EventSource, Timestamp};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{info, instrument, warn};

// ============================================================================
// Results
// ============================================================================

/// Outcome of receiving one notification
#[derive(Debug, Clone)]
pub enum DispatchResult {
    /// Stored and handled successfully
    Processed { event_id: EventId, mutations: usize },

    /// The `(source, external_event_id)` pair was already stored; the
    /// handler was not invoked. An idempotent acknowledgement, not an error.
    Duplicate { event_id: EventId },

    /// Stored, but the event type has no registered handling; recorded as
    /// processed with no error so the long tail of notification types does
    /// not read as failures
    Ignored { event_id: EventId },

    /// Stored, but the handler failed; recorded with `processed = false`
    /// and the error message, eligible for redelivery or explicit retry
    Failed {
        event_id: EventId,
        error: String,
        retryable: bool,
    },
}

impl DispatchResult {
    /// The stored event this result refers to
    pub fn event_id(&self) -> EventId {
        match self {
            Self::Processed { event_id, .. }
            | Self::Duplicate { event_id }
            | Self::Ignored { event_id }
            | Self::Failed { event_id, .. } => *event_id,
        }
    }
}

/// Failure of the dispatch machinery itself (not of a handler)
///
/// Surfaces only when the event store cannot be reached; the notification
/// could not be recorded, so the sender must redeliver.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Event store error: {0}")]
    Store(#[from] StoreError),
}

// ============================================================================
// Dispatcher
// ============================================================================

/// The webhook intake pipeline after signature verification
pub struct WebhookDispatcher {
    event_store: Arc<dyn EventStore>,
    handlers: HandlerRegistry,
}

impl WebhookDispatcher {
    pub fn new(event_store: Arc<dyn EventStore>, handlers: HandlerRegistry) -> Self {
        Self {
            event_store,
            handlers,
        }
    }

    /// The handler registry, for introspection
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Receive one verified notification
    ///
    /// Deduplication is atomic at the store: concurrent redelivery of the
    /// same external event yields exactly one `Inserted` and the rest
    /// `Duplicate`, so a handler never runs twice for one delivery.
    #[instrument(skip(self, raw_payload), fields(source = %source, event_type = %event_type))]
    pub async fn receive(
        &self,
        source: EventSource,
        event_type: &str,
        external_event_id: &str,
        raw_payload: Bytes,
    ) -> Result<DispatchResult, DispatchError> {
        let new_event = NewWebhookEvent {
            source,
            event_type: event_type.to_string(),
            external_event_id: external_event_id.to_string(),
            raw_payload,
        };

        let event = match self.event_store.insert(new_event).await? {
            InsertOutcome::Inserted(event) => event,
            InsertOutcome::Duplicate { existing } => {
                info!(
                    event_id = %existing,
                    external_event_id = %external_event_id,
                    "Duplicate delivery suppressed"
                );
                return Ok(DispatchResult::Duplicate { event_id: existing });
            }
        };

        self.process(&event).await
    }

    /// Dispatch a stored event to its handler and record the outcome
    ///
    /// This is the shared path for live dispatch and replay: the retry
    /// coordinator re-enters here with the stored record.
    pub(crate) async fn process(
        &self,
        event: &WebhookEvent,
    ) -> Result<DispatchResult, DispatchError> {
        let handler = match self.handlers.get(event.source) {
            Some(handler) => handler,
            None => {
                // A source without a handler is a wiring gap, not a bad
                // event; leave the event retryable.
                let message = format!("no handler registered for source '{}'", event.source);
                warn!(event_id = %event.id, "{}", message);
                self.event_store.mark_failed(&event.id, &message).await?;
                return Ok(DispatchResult::Failed {
                    event_id: event.id,
                    error: message,
                    retryable: true,
                });
            }
        };

        if !handler
            .supported_events()
            .contains(&event.event_type.as_str())
        {
            info!(
                event_id = %event.id,
                event_type = %event.event_type,
                "Unhandled event type recorded as processed"
            );
            self.event_store
                .mark_processed(&event.id, Timestamp::now())
                .await?;
            return Ok(DispatchResult::Ignored { event_id: event.id });
        }

        match handler.handle(&event.event_type, &event.raw_payload).await {
            Ok(report) => {
                self.event_store
                    .mark_processed(&event.id, Timestamp::now())
                    .await?;
                info!(
                    event_id = %event.id,
                    mutations = report.mutations.len(),
                    "Event processed"
                );
                Ok(DispatchResult::Processed {
                    event_id: event.id,
                    mutations: report.mutations.len(),
                })
            }
            Err(error) => {
                let message = error.to_string();
                warn!(
                    event_id = %event.id,
                    retryable = error.is_retryable(),
                    error = %message,
                    "Event handler failed"
                );
                self.event_store.mark_failed(&event.id, &message).await?;
                Ok(DispatchResult::Failed {
                    event_id: event.id,
                    error: message,
                    retryable: error.is_retryable(),
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
