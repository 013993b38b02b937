//! # Caseflow Core
//!
//! Core business logic for the Caseflow event ingestion and automation
//! subsystem.
//!
//! This crate contains the domain logic for receiving third-party webhook
//! notifications (payment processor, source-control host), verifying
//! signatures, deduplicating and persisting events, dispatching them to
//! business-logic handlers, and running the scheduled ticket automation
//! rules (auto-assign, auto-close, SLA-breach flagging).
//!
//! ## Architecture
//!
//! The core follows clean architecture principles:
//! - Business logic depends only on trait abstractions
//! - Storage implementations are injected at runtime
//! - All external dependencies are abstracted behind traits
//!
//! ## Usage
//!
//! ```rust
//! use caseflow_core::{EventId, EventSource};
//!
//! let event_id = EventId::new();
//! let source: EventSource = "payment".parse().unwrap();
//! assert_eq!(source, EventSource::Payment);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// Re-export commonly used types
pub use ulid::Ulid;
pub use uuid::Uuid;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Unique identifier for stored webhook events
///
/// Uses ULID for lexicographic sorting and global uniqueness, so the event
/// listing endpoint can order by identifier and get receipt order for free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Ulid);

impl EventId {
    /// Generate a new unique event ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Get string representation of event ID
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = s.parse::<Ulid>().map_err(|_| ParseError::InvalidFormat {
            expected: "ULID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(ulid))
    }
}

/// Unique identifier for support tickets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Generate a new ticket ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TicketId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = s.parse::<Uuid>().map_err(|_| ParseError::InvalidFormat {
            expected: "UUID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(uuid))
    }
}

/// Unique identifier for quote requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(Uuid);

impl QuoteId {
    /// Generate a new quote ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QuoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for project tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a new task ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Event Source
// ============================================================================

/// Origin system of an inbound webhook notification
///
/// Each source has its own signing scheme, header conventions, and event
/// handler. The enum is closed on purpose: adding a source means adding a
/// verifier and a handler, not just a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    /// Payment processor (subscriptions, invoices)
    Payment,
    /// Source-control host (pushes, pull requests)
    Scm,
}

impl EventSource {
    /// Get string representation (also the URL path segment)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Scm => "scm",
        }
    }

    /// All known sources, in registration order
    pub fn all() -> &'static [EventSource] {
        &[EventSource::Payment, EventSource::Scm]
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventSource {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment" => Ok(Self::Payment),
            "scm" => Ok(Self::Scm),
            _ => Err(ParseError::InvalidFormat {
                expected: "payment or scm".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Time
// ============================================================================

/// UTC timestamp with microsecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse timestamp from RFC3339 string
    pub fn from_rfc3339(s: &str) -> Result<Self, ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|_| ParseError::InvalidFormat {
                expected: "RFC3339 datetime".to_string(),
                actual: s.to_string(),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Add whole hours to the timestamp
    pub fn add_hours(&self, hours: i64) -> Self {
        Self(self.0 + chrono::Duration::hours(hours))
    }

    /// Subtract whole hours from the timestamp
    pub fn sub_hours(&self, hours: i64) -> Self {
        Self(self.0 - chrono::Duration::hours(hours))
    }

    /// Subtract whole days from the timestamp
    pub fn sub_days(&self, days: i64) -> Self {
        Self(self.0 - chrono::Duration::days(days))
    }

    /// Get duration since another timestamp (zero if `other` is later)
    pub fn duration_since(&self, other: Self) -> Duration {
        self.0
            .signed_duration_since(other.0)
            .to_std()
            .unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for input validation failures
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },
}

/// Error type for string parsing failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

// ============================================================================
// Module declarations
// ============================================================================

/// Durable event store contract and stored-event record
pub mod event_store;

/// Ticket, quote, subscription, and task records plus their store contracts
pub mod records;

/// Ticket and quote lifecycle transition tables
pub mod state_machine;

/// SLA deadline calculation and breach predicate
pub mod sla;

/// Append-only activity ledger written by every automated mutation
pub mod activity_log;

/// Webhook intake: signature verification, dispatch, and replay
pub mod webhook;

/// Per-source business-logic event handlers
pub mod handlers;

/// Scheduled automation rules over open tickets
pub mod automation;

/// In-memory storage adapters for tests and the default service wiring
pub mod adapters;

// Re-export key types for convenience
pub use activity_log::{ActivityLog, ActivityLogEntry, NewActivityEntry};
pub use automation::{AutomationConfig, AutomationEngine, AutomationReport};
pub use event_store::{
    EventFilter, EventStore, InsertOutcome, NewWebhookEvent, StoreError, WebhookEvent,
};
pub use handlers::{EventHandler, HandlerError, HandlerRegistry, HandlerReport};
pub use records::{
    LeadQuality, ProjectTask, QuoteIntake, QuoteRequest, QuoteStatus, QuoteStore, Subscription,
    SubscriptionStatus, SubscriptionStore, SupportTicket, TaskStatus, TaskStore, TicketPriority,
    TicketStatus, TicketStore,
};
pub use state_machine::InvalidTransition;
pub use webhook::{
    DispatchResult, RetryCoordinator, RetryError, RetryOutcome, SignatureError, SignatureVerifier,
    VerifierRegistry, WebhookDispatcher,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
