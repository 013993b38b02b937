//! # Event Handlers
//!
//! Per-source business logic mapping a stored notification to entity
//! mutations.
//!
//! Handlers are written in two layers: a pure *planning* function deriving
//! the intended mutations from `(event_type, payload)`, and an *apply* step
//! executing each mutation as an atomic upsert through the entity store.
//! Mutations always set absolute state ("status = canceled"), never apply
//! deltas, so replaying an event converges to the same end state.
//!
//! Retryability is a caller-visible property: a handler fails with either
//! [`HandlerError::Retryable`] (the referenced entity may not have synced
//! yet) or [`HandlerError::Fatal`] (the payload itself is unusable).

use crate::EventSource;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

mod payment;
mod scm;

pub use payment::PaymentEventHandler;
pub use scm::ScmEventHandler;

// ============================================================================
// Results
// ============================================================================

/// One entity mutation applied by a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMutation {
    pub entity_type: &'static str,
    pub entity_id: String,
    pub action: &'static str,
}

/// Successful handler run: the mutations that were applied
///
/// An empty report is a legitimate success (the handler recognized the
/// event type but had nothing to change).
#[derive(Debug, Clone, Default)]
pub struct HandlerReport {
    pub mutations: Vec<AppliedMutation>,
}

impl HandlerReport {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entity_type: &'static str, entity_id: impl Into<String>, action: &'static str) {
        self.mutations.push(AppliedMutation {
            entity_type,
            entity_id: entity_id.into(),
            action,
        });
    }
}

/// Handler failure with caller-visible retryability
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The event may succeed later (e.g. a referenced record has not
    /// synced yet); the event stays eligible for redelivery and replay
    #[error("Retryable handler failure: {reason}")]
    Retryable { reason: String },

    /// The payload cannot be processed as-is; replay will fail the same way
    #[error("Fatal handler failure: {reason}")]
    Fatal { reason: String },
}

impl HandlerError {
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self::Retryable {
            reason: reason.into(),
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal {
            reason: reason.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

impl From<crate::StoreError> for HandlerError {
    fn from(error: crate::StoreError) -> Self {
        if error.is_transient() {
            Self::Retryable {
                reason: error.to_string(),
            }
        } else {
            Self::Fatal {
                reason: error.to_string(),
            }
        }
    }
}

// ============================================================================
// Handler Contract
// ============================================================================

/// Business-logic handler for one notification source
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// The source this handler consumes
    fn source(&self) -> EventSource;

    /// Event types this handler acts on
    ///
    /// Types outside this list are recorded as processed without invoking
    /// [`EventHandler::handle`]; the list also feeds the introspection
    /// endpoint.
    fn supported_events(&self) -> &'static [&'static str];

    /// Apply the event's mutations
    ///
    /// Must be idempotent: invoked again with the same payload (live
    /// redelivery or replay), the end state is unchanged.
    async fn handle(&self, event_type: &str, payload: &[u8])
        -> Result<HandlerReport, HandlerError>;
}

// ============================================================================
// Registry
// ============================================================================

/// Registry mapping sources to their event handlers
///
/// Built once at startup and used read-only during dispatch.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<EventSource, Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    /// Create a new, empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under its own source, replacing any existing one
    pub fn register(&mut self, handler: Arc<dyn EventHandler>) -> &mut Self {
        self.handlers.insert(handler.source(), handler);
        self
    }

    /// Look up the handler for a source
    pub fn get(&self, source: EventSource) -> Option<Arc<dyn EventHandler>> {
        self.handlers.get(&source).cloned()
    }

    /// Registered sources with their supported event types, for
    /// introspection
    pub fn descriptors(&self) -> Vec<(EventSource, &'static [&'static str])> {
        let mut entries: Vec<_> = self
            .handlers
            .values()
            .map(|h| (h.source(), h.supported_events()))
            .collect();
        entries.sort_by_key(|(source, _)| source.as_str());
        entries
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
