//! # Entity Records
//!
//! The support-ticket, sales-quote, subscription, and project-task records
//! mutated by the webhook handlers and the automation engine, together with
//! their storage contracts.
//!
//! Every store method is an atomic operation against the external storage
//! collaborator; the core never holds entity state between calls. Updates
//! are whole-record replacements (read-modify-write) so the store's
//! per-record atomicity is the only serialization mechanism required.

use crate::sla;
use crate::{QuoteId, StoreError, TaskId, TicketId, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Support Tickets
// ============================================================================

/// Lifecycle state of a support ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    WaitingClient,
    Resolved,
    Closed,
}

impl TicketStatus {
    /// Statuses in which a ticket is still being worked and SLA applies
    pub fn open_set() -> &'static [TicketStatus] {
        &[
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::WaitingClient,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::WaitingClient => "waiting_client",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket priority, driving the SLA deadline at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketPriority {
    type Err = crate::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(crate::ParseError::InvalidFormat {
                expected: "low, medium, high, or urgent".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

/// A client service request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportTicket {
    pub id: TicketId,
    pub subject: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub assignee_id: Option<String>,

    /// Derived once from priority at creation; never recalculated, even if
    /// the priority later changes.
    pub sla_deadline: Option<Timestamp>,

    /// Transitions false -> true at most once per ticket
    pub sla_breach: bool,
    pub sla_breached_at: Option<Timestamp>,

    pub resolved_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SupportTicket {
    /// Create a new open ticket, fixing the SLA deadline from the priority
    pub fn new(subject: impl Into<String>, priority: TicketPriority) -> Self {
        let now = Timestamp::now();
        Self {
            id: TicketId::new(),
            subject: subject.into(),
            status: TicketStatus::Open,
            priority,
            assignee_id: None,
            sla_deadline: Some(sla::deadline(priority, now)),
            sla_breach: false,
            sla_breached_at: None,
            resolved_at: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a lifecycle transition, enforcing the ticket transition table
    ///
    /// Sets `resolved_at`/`closed_at` when entering the corresponding state.
    pub fn transition(
        &mut self,
        to: TicketStatus,
        at: Timestamp,
    ) -> Result<(), crate::InvalidTransition> {
        crate::state_machine::check_ticket_transition(self.status, to)?;
        self.status = to;
        self.updated_at = at;
        match to {
            TicketStatus::Resolved => self.resolved_at = Some(at),
            TicketStatus::Closed => self.closed_at = Some(at),
            _ => {}
        }
        Ok(())
    }
}

/// Storage contract for support tickets
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn get(&self, id: &TicketId) -> Result<Option<SupportTicket>, StoreError>;

    async fn insert(&self, ticket: SupportTicket) -> Result<(), StoreError>;

    /// Replace the stored record atomically; fails with `NotFound` if the
    /// ticket was never inserted
    async fn update(&self, ticket: &SupportTicket) -> Result<(), StoreError>;

    /// All tickets currently in any of the given statuses
    async fn list_by_status(
        &self,
        statuses: &[TicketStatus],
    ) -> Result<Vec<SupportTicket>, StoreError>;
}

// ============================================================================
// Quote Requests
// ============================================================================

/// Lifecycle state of a sales quote request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    New,
    Contacted,
    Qualified,
    Proposal,
    Accepted,
    Declined,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Proposal => "proposal",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lead quality bucket derived from the lead score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadQuality {
    Hot,
    Warm,
    Cold,
}

/// Intake fields captured when a quote request is submitted
///
/// The lead score is a pure function of these fields and is computed
/// exactly once, at creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteIntake {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    /// Stated budget in whole currency units
    pub budget: Option<u32>,
    /// Free-text timeline ("ASAP", "within 1 month", ...)
    pub timeline: Option<String>,
    pub message: String,
    pub referral: Option<String>,
}

impl QuoteIntake {
    /// Derive the lead score (0-100) and quality bucket
    ///
    /// Weights: budget band up to 40, timeline urgency up to 25, referral
    /// 15, message substance up to 10, named company 10. Thresholds: >= 70
    /// hot, >= 40 warm, else cold.
    pub fn score(&self) -> (u8, LeadQuality) {
        let mut score: u32 = 0;

        score += match self.budget {
            Some(b) if b >= 25_000 => 40,
            Some(b) if b >= 10_000 => 30,
            Some(b) if b >= 5_000 => 20,
            Some(b) if b >= 1_000 => 10,
            _ => 0,
        };

        if let Some(timeline) = &self.timeline {
            let t = timeline.to_lowercase();
            score += if t.contains("asap") || t.contains("immediately") {
                25
            } else if t.contains("month") {
                20
            } else if t.contains("quarter") || t.contains("3 months") {
                10
            } else {
                0
            };
        }

        if self.referral.is_some() {
            score += 15;
        }

        score += match self.message.chars().count() {
            n if n >= 200 => 10,
            n if n >= 50 => 5,
            _ => 0,
        };

        if self.company.is_some() {
            score += 10;
        }

        let score = score.min(100) as u8;
        let quality = match score {
            s if s >= 70 => LeadQuality::Hot,
            s if s >= 40 => LeadQuality::Warm,
            _ => LeadQuality::Cold,
        };
        (score, quality)
    }
}

/// A sales lead
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub id: QuoteId,
    pub status: QuoteStatus,
    pub intake: QuoteIntake,

    /// Derived once at creation; not recomputed when intake fields change
    pub lead_score: u8,
    pub lead_quality: LeadQuality,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl QuoteRequest {
    /// Create a new quote request in `New`, scoring the lead once
    pub fn new(intake: QuoteIntake) -> Self {
        let now = Timestamp::now();
        let (lead_score, lead_quality) = intake.score();
        Self {
            id: QuoteId::new(),
            status: QuoteStatus::New,
            intake,
            lead_score,
            lead_quality,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a lifecycle transition, enforcing the quote transition table
    pub fn transition(
        &mut self,
        to: QuoteStatus,
        at: Timestamp,
    ) -> Result<(), crate::InvalidTransition> {
        crate::state_machine::check_quote_transition(self.status, to)?;
        self.status = to;
        self.updated_at = at;
        Ok(())
    }
}

/// Storage contract for quote requests
#[async_trait]
pub trait QuoteStore: Send + Sync {
    async fn get(&self, id: &QuoteId) -> Result<Option<QuoteRequest>, StoreError>;

    async fn insert(&self, quote: QuoteRequest) -> Result<(), StoreError>;

    async fn update(&self, quote: &QuoteRequest) -> Result<(), StoreError>;
}

// ============================================================================
// Subscriptions
// ============================================================================

/// Billing state mirrored from the payment processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Incomplete,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Incomplete => "incomplete",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = crate::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "trialing" => Ok(Self::Trialing),
            "past_due" => Ok(Self::PastDue),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            "incomplete" => Ok(Self::Incomplete),
            _ => Err(crate::ParseError::InvalidFormat {
                expected: "a subscription status".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

/// Local mirror of a payment-processor subscription
///
/// Keyed by the processor's own identifier; webhook handlers only ever set
/// the status to an absolute value, never apply deltas, so re-processing an
/// event converges instead of compounding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// The processor's subscription identifier (e.g. "sub_42")
    pub external_id: String,
    pub status: SubscriptionStatus,
    pub updated_at: Timestamp,
}

/// Storage contract for subscription mirrors
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get(&self, external_id: &str) -> Result<Option<Subscription>, StoreError>;

    /// Insert or replace the record for its external ID
    async fn upsert(&self, subscription: Subscription) -> Result<(), StoreError>;

    /// Set the status of an existing record; returns false when no record
    /// with that external ID exists (the caller decides retryability)
    async fn set_status(
        &self,
        external_id: &str,
        status: SubscriptionStatus,
        at: Timestamp,
    ) -> Result<bool, StoreError>;
}

// ============================================================================
// Project Tasks
// ============================================================================

/// Delivery state of a tracked project task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
}

/// A tracked unit of delivery work, linkable from commits and pull requests
/// via its human-readable reference ("TASK-17")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectTask {
    pub id: TaskId,
    /// Human-readable key referenced from commit messages and PR titles
    pub reference: String,
    pub title: String,
    pub status: TaskStatus,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl ProjectTask {
    pub fn new(reference: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            reference: reference.into(),
            title: title.into(),
            status: TaskStatus::Todo,
            completed_at: None,
            created_at: Timestamp::now(),
        }
    }
}

/// Storage contract for project tasks
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Look up a task by its human-readable reference (case-insensitive)
    async fn get_by_reference(&self, reference: &str) -> Result<Option<ProjectTask>, StoreError>;

    async fn insert(&self, task: ProjectTask) -> Result<(), StoreError>;

    async fn update(&self, task: &ProjectTask) -> Result<(), StoreError>;
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;
