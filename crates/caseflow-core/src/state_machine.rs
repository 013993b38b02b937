//! # Lifecycle State Machine
//!
//! Explicit transition tables for support tickets and quote requests.
//!
//! The tables are the single source of truth for which transitions are
//! legal; every status change anywhere in the system goes through
//! [`check_ticket_transition`] or [`check_quote_transition`]. A request
//! outside the table fails with [`InvalidTransition`] naming the attempted
//! pair; it is never silently coerced.

use crate::records::{QuoteStatus, TicketStatus};

// ============================================================================
// Transition Tables
// ============================================================================

/// Legal ticket transitions
///
/// Resolved is reachable from in-progress or waiting-on-client; Closed is
/// terminal. The waiting-client -> in-progress back-edge covers the client
/// replying and work resuming.
const TICKET_TRANSITIONS: &[(TicketStatus, TicketStatus)] = &[
    (TicketStatus::Open, TicketStatus::InProgress),
    (TicketStatus::InProgress, TicketStatus::WaitingClient),
    (TicketStatus::InProgress, TicketStatus::Resolved),
    (TicketStatus::WaitingClient, TicketStatus::InProgress),
    (TicketStatus::WaitingClient, TicketStatus::Resolved),
    (TicketStatus::Resolved, TicketStatus::Closed),
];

/// Legal quote transitions
///
/// Proposal -> Qualified is the allowed back-edge (proposal withdrawn for
/// re-qualification); Accepted is terminal; Declined can only reopen to New.
const QUOTE_TRANSITIONS: &[(QuoteStatus, QuoteStatus)] = &[
    (QuoteStatus::New, QuoteStatus::Contacted),
    (QuoteStatus::New, QuoteStatus::Declined),
    (QuoteStatus::Contacted, QuoteStatus::Qualified),
    (QuoteStatus::Contacted, QuoteStatus::Declined),
    (QuoteStatus::Qualified, QuoteStatus::Proposal),
    (QuoteStatus::Qualified, QuoteStatus::Declined),
    (QuoteStatus::Proposal, QuoteStatus::Accepted),
    (QuoteStatus::Proposal, QuoteStatus::Declined),
    (QuoteStatus::Proposal, QuoteStatus::Qualified),
    (QuoteStatus::Declined, QuoteStatus::New),
];

// ============================================================================
// Errors
// ============================================================================

/// A transition request outside the table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {entity} transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub entity: &'static str,
    pub from: String,
    pub to: String,
}

// ============================================================================
// Checks
// ============================================================================

/// Check a ticket transition against the table
pub fn check_ticket_transition(
    from: TicketStatus,
    to: TicketStatus,
) -> Result<(), InvalidTransition> {
    if TICKET_TRANSITIONS.contains(&(from, to)) {
        Ok(())
    } else {
        Err(InvalidTransition {
            entity: "ticket",
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Check a quote transition against the table
pub fn check_quote_transition(from: QuoteStatus, to: QuoteStatus) -> Result<(), InvalidTransition> {
    if QUOTE_TRANSITIONS.contains(&(from, to)) {
        Ok(())
    } else {
        Err(InvalidTransition {
            entity: "quote",
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Targets reachable from a quote status, in table order
pub fn quote_targets(from: QuoteStatus) -> Vec<QuoteStatus> {
    QUOTE_TRANSITIONS
        .iter()
        .filter(|(f, _)| *f == from)
        .map(|(_, t)| *t)
        .collect()
}

/// Targets reachable from a ticket status, in table order
pub fn ticket_targets(from: TicketStatus) -> Vec<TicketStatus> {
    TICKET_TRANSITIONS
        .iter()
        .filter(|(f, _)| *f == from)
        .map(|(_, t)| *t)
        .collect()
}

#[cfg(test)]
#[path = "state_machine_tests.rs"]
mod tests;
