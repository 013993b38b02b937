//! # In-Memory Storage Implementations
//!
//! Thread-safe in-memory implementations of every storage contract.
//!
//! Each store is a `RwLock`-guarded map plus an insertion-order index, so
//! listings are deterministic. The event store performs its uniqueness
//! check and insert under one write lock, which is exactly the atomic
//! check-then-insert the dispatcher's deduplication contract requires.

use crate::activity_log::{ActivityLog, ActivityLogEntry, NewActivityEntry};
use crate::event_store::{
    EventFilter, EventStore, InsertOutcome, NewWebhookEvent, StoreError, WebhookEvent,
};
use crate::records::{
    ProjectTask, QuoteRequest, QuoteStore, Subscription, SubscriptionStatus, SubscriptionStore,
    SupportTicket, TaskStore, TicketStatus, TicketStore,
};
use crate::{EventId, EventSource, QuoteId, TicketId, Timestamp};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

// ============================================================================
// Event Store
// ============================================================================

#[derive(Default)]
struct EventStoreInner {
    events: HashMap<EventId, WebhookEvent>,
    by_external: HashMap<(EventSource, String), EventId>,
    order: Vec<EventId>,
}

/// In-memory [`EventStore`]
#[derive(Clone, Default)]
pub struct MemoryEventStore {
    inner: Arc<RwLock<EventStoreInner>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert(&self, event: NewWebhookEvent) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.inner.write().expect("event store lock poisoned");

        let key = (event.source, event.external_event_id.clone());
        if let Some(existing) = inner.by_external.get(&key) {
            return Ok(InsertOutcome::Duplicate {
                existing: *existing,
            });
        }

        let event = event.into_event();
        inner.by_external.insert(key, event.id);
        inner.order.push(event.id);
        inner.events.insert(event.id, event.clone());
        Ok(InsertOutcome::Inserted(event))
    }

    async fn get(&self, id: &EventId) -> Result<Option<WebhookEvent>, StoreError> {
        let inner = self.inner.read().expect("event store lock poisoned");
        Ok(inner.events.get(id).cloned())
    }

    async fn mark_processed(&self, id: &EventId, at: Timestamp) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("event store lock poisoned");
        let event = inner.events.get_mut(id).ok_or_else(|| StoreError::NotFound {
            resource: "event".to_string(),
            id: id.to_string(),
        })?;
        event.processed = true;
        event.processed_at = Some(at);
        event.error = None;
        Ok(())
    }

    async fn mark_failed(&self, id: &EventId, error: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("event store lock poisoned");
        let event = inner.events.get_mut(id).ok_or_else(|| StoreError::NotFound {
            resource: "event".to_string(),
            id: id.to_string(),
        })?;
        event.processed = false;
        event.processed_at = None;
        event.error = Some(error.to_string());
        Ok(())
    }

    async fn list(&self, filter: &EventFilter) -> Result<Vec<WebhookEvent>, StoreError> {
        let inner = self.inner.read().expect("event store lock poisoned");
        let events = inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.events.get(id))
            .filter(|event| filter.source.is_none_or(|s| event.source == s))
            .filter(|event| filter.processed.is_none_or(|p| event.processed == p))
            .take(filter.effective_limit())
            .cloned()
            .collect();
        Ok(events)
    }
}

// ============================================================================
// Ticket Store
// ============================================================================

#[derive(Default)]
struct TicketStoreInner {
    tickets: HashMap<TicketId, SupportTicket>,
    order: Vec<TicketId>,
}

/// In-memory [`TicketStore`]
#[derive(Clone, Default)]
pub struct MemoryTicketStore {
    inner: Arc<RwLock<TicketStoreInner>>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn get(&self, id: &TicketId) -> Result<Option<SupportTicket>, StoreError> {
        let inner = self.inner.read().expect("ticket store lock poisoned");
        Ok(inner.tickets.get(id).cloned())
    }

    async fn insert(&self, ticket: SupportTicket) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("ticket store lock poisoned");
        inner.order.push(ticket.id);
        inner.tickets.insert(ticket.id, ticket);
        Ok(())
    }

    async fn update(&self, ticket: &SupportTicket) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("ticket store lock poisoned");
        match inner.tickets.get_mut(&ticket.id) {
            Some(stored) => {
                *stored = ticket.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                resource: "ticket".to_string(),
                id: ticket.id.to_string(),
            }),
        }
    }

    async fn list_by_status(
        &self,
        statuses: &[TicketStatus],
    ) -> Result<Vec<SupportTicket>, StoreError> {
        let inner = self.inner.read().expect("ticket store lock poisoned");
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.tickets.get(id))
            .filter(|ticket| statuses.contains(&ticket.status))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Quote Store
// ============================================================================

#[derive(Default)]
struct QuoteStoreInner {
    quotes: HashMap<QuoteId, QuoteRequest>,
}

/// In-memory [`QuoteStore`]
#[derive(Clone, Default)]
pub struct MemoryQuoteStore {
    inner: Arc<RwLock<QuoteStoreInner>>,
}

impl MemoryQuoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuoteStore for MemoryQuoteStore {
    async fn get(&self, id: &QuoteId) -> Result<Option<QuoteRequest>, StoreError> {
        let inner = self.inner.read().expect("quote store lock poisoned");
        Ok(inner.quotes.get(id).cloned())
    }

    async fn insert(&self, quote: QuoteRequest) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("quote store lock poisoned");
        inner.quotes.insert(quote.id, quote);
        Ok(())
    }

    async fn update(&self, quote: &QuoteRequest) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("quote store lock poisoned");
        match inner.quotes.get_mut(&quote.id) {
            Some(stored) => {
                *stored = quote.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                resource: "quote".to_string(),
                id: quote.id.to_string(),
            }),
        }
    }
}

// ============================================================================
// Subscription Store
// ============================================================================

/// In-memory [`SubscriptionStore`], keyed by the processor's identifier
#[derive(Clone, Default)]
pub struct MemorySubscriptionStore {
    inner: Arc<RwLock<HashMap<String, Subscription>>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn get(&self, external_id: &str) -> Result<Option<Subscription>, StoreError> {
        let inner = self.inner.read().expect("subscription store lock poisoned");
        Ok(inner.get(external_id).cloned())
    }

    async fn upsert(&self, subscription: Subscription) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("subscription store lock poisoned");
        inner.insert(subscription.external_id.clone(), subscription);
        Ok(())
    }

    async fn set_status(
        &self,
        external_id: &str,
        status: SubscriptionStatus,
        at: Timestamp,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().expect("subscription store lock poisoned");
        match inner.get_mut(external_id) {
            Some(subscription) => {
                subscription.status = status;
                subscription.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ============================================================================
// Task Store
// ============================================================================

#[derive(Default)]
struct TaskStoreInner {
    tasks: HashMap<String, ProjectTask>,
}

/// In-memory [`TaskStore`], indexed by normalized task reference
#[derive(Clone, Default)]
pub struct MemoryTaskStore {
    inner: Arc<RwLock<TaskStoreInner>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(reference: &str) -> String {
        reference.to_ascii_uppercase()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn get_by_reference(&self, reference: &str) -> Result<Option<ProjectTask>, StoreError> {
        let inner = self.inner.read().expect("task store lock poisoned");
        Ok(inner.tasks.get(&Self::normalize(reference)).cloned())
    }

    async fn insert(&self, task: ProjectTask) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("task store lock poisoned");
        inner.tasks.insert(Self::normalize(&task.reference), task);
        Ok(())
    }

    async fn update(&self, task: &ProjectTask) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("task store lock poisoned");
        let key = Self::normalize(&task.reference);
        match inner.tasks.get_mut(&key) {
            Some(stored) => {
                *stored = task.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                resource: "task".to_string(),
                id: task.reference.clone(),
            }),
        }
    }
}

// ============================================================================
// Activity Log
// ============================================================================

/// In-memory [`ActivityLog`]; entries are only ever appended
#[derive(Clone, Default)]
pub struct MemoryActivityLog {
    entries: Arc<RwLock<Vec<ActivityLogEntry>>>,
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry appended so far, oldest first (test helper)
    pub fn all_entries(&self) -> Vec<ActivityLogEntry> {
        self.entries
            .read()
            .expect("activity log lock poisoned")
            .clone()
    }
}

#[async_trait]
impl ActivityLog for MemoryActivityLog {
    async fn append(&self, entry: NewActivityEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.write().expect("activity log lock poisoned");
        entries.push(entry.into_entry());
        Ok(())
    }

    async fn entries_for(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        let entries = self.entries.read().expect("activity log lock poisoned");
        Ok(entries
            .iter()
            .filter(|e| e.entity_type == entity_type && e.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
