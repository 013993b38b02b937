//! # Activity Log
//!
//! Append-only audit ledger. Every automated mutation — webhook-driven or
//! automation-rule-driven — appends exactly one entry; entries are never
//! updated or deleted.

use crate::{StoreError, Timestamp, Ulid};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Types
// ============================================================================

/// One immutable audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    /// Store-assigned identifier (ULID, so entries sort by append order)
    pub id: Ulid,

    /// What happened, as a dotted action name ("ticket.auto_assigned")
    pub action: String,

    /// Kind of entity mutated ("ticket", "subscription", "task")
    pub entity_type: String,

    /// Identifier of the mutated entity
    pub entity_id: String,

    /// Acting user, or `None` for system-initiated mutations
    pub actor: Option<String>,

    /// Structured context for the action
    pub metadata: serde_json::Value,

    pub created_at: Timestamp,
}

/// An entry about to be appended
#[derive(Debug, Clone)]
pub struct NewActivityEntry {
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub actor: Option<String>,
    pub metadata: serde_json::Value,
}

impl NewActivityEntry {
    /// Build a system-initiated entry (no acting user)
    pub fn system(
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            actor: None,
            metadata,
        }
    }

    /// Materialize the stored entry, assigning an ID and timestamp
    pub fn into_entry(self) -> ActivityLogEntry {
        ActivityLogEntry {
            id: Ulid::new(),
            action: self.action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            actor: self.actor,
            metadata: self.metadata,
            created_at: Timestamp::now(),
        }
    }
}

// ============================================================================
// Store Contract
// ============================================================================

/// Append-only storage for activity entries
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// Append one entry; there is deliberately no update or delete
    async fn append(&self, entry: NewActivityEntry) -> Result<(), StoreError>;

    /// All entries for one entity, oldest first
    async fn entries_for(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<ActivityLogEntry>, StoreError>;
}

#[cfg(test)]
#[path = "activity_log_tests.rs"]
mod tests;
