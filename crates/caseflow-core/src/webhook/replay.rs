//! # Retry Coordinator
//!
//! Explicit replay of a stored event, used by operators (and automation)
//! after a handler failure. Replay re-enters the same dispatch path as
//! live delivery, working entirely from the stored record: the payload,
//! event type, and source are re-derived from the event store, never from
//! caller-supplied hints.

use crate::event_store::{EventStore, StoreError};
use crate::webhook::dispatcher::{DispatchError, DispatchResult, WebhookDispatcher};
use crate::{EventId, EventSource};
use std::sync::Arc;
use tracing::{info, instrument};

// ============================================================================
// Results
// ============================================================================

/// Outcome of a replay request
#[derive(Debug, Clone)]
pub enum RetryOutcome {
    /// The event was already processed; the handler was not re-invoked
    AlreadyProcessed { event_id: EventId },

    /// The handler ran again and succeeded (or the event type is unhandled
    /// and the event is now recorded as processed)
    Reprocessed { event_id: EventId, mutations: usize },

    /// The handler ran again and failed; the stored error was updated
    Failed {
        event_id: EventId,
        error: String,
        retryable: bool,
    },
}

/// Rejection or failure of a replay request
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    #[error("Event not found: {event_id}")]
    NotFound { event_id: EventId },

    #[error("No handler registered for source '{event_source}' of event {event_id}")]
    NoHandler {
        event_id: EventId,
        event_source: EventSource,
    },

    #[error("Event store error: {0}")]
    Store(#[from] StoreError),
}

impl From<DispatchError> for RetryError {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::Store(store_error) => Self::Store(store_error),
        }
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Replays stored events through the dispatcher
pub struct RetryCoordinator {
    event_store: Arc<dyn EventStore>,
    dispatcher: Arc<WebhookDispatcher>,
}

impl RetryCoordinator {
    pub fn new(event_store: Arc<dyn EventStore>, dispatcher: Arc<WebhookDispatcher>) -> Self {
        Self {
            event_store,
            dispatcher,
        }
    }

    /// Replay one stored event
    ///
    /// An already-processed event is an idempotent no-op success; a record
    /// whose source has no registered handler is rejected outright rather
    /// than marked failed again.
    #[instrument(skip(self), fields(event_id = %event_id))]
    pub async fn retry(&self, event_id: EventId) -> Result<RetryOutcome, RetryError> {
        let event = self
            .event_store
            .get(&event_id)
            .await?
            .ok_or(RetryError::NotFound { event_id })?;

        if event.processed {
            info!("Retry requested for already-processed event; no-op");
            return Ok(RetryOutcome::AlreadyProcessed { event_id });
        }

        if self.dispatcher.handlers().get(event.source).is_none() {
            return Err(RetryError::NoHandler {
                event_id,
                event_source: event.source,
            });
        }

        match self.dispatcher.process(&event).await? {
            DispatchResult::Processed {
                event_id,
                mutations,
            } => Ok(RetryOutcome::Reprocessed {
                event_id,
                mutations,
            }),
            DispatchResult::Ignored { event_id } => Ok(RetryOutcome::Reprocessed {
                event_id,
                mutations: 0,
            }),
            DispatchResult::Failed {
                event_id,
                error,
                retryable,
            } => Ok(RetryOutcome::Failed {
                event_id,
                error,
                retryable,
            }),
            // receive() is the only producer of Duplicate; process() cannot
            // return it for an already-stored record.
            DispatchResult::Duplicate { event_id } => Ok(RetryOutcome::AlreadyProcessed {
                event_id,
            }),
        }
    }
}

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;
