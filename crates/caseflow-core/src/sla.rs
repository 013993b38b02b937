//! # SLA Calculator
//!
//! Pure mapping from ticket priority to resolution deadline, and the breach
//! predicate used by the automation engine.

use crate::records::TicketPriority;
use crate::Timestamp;

/// Resolution window in hours for a priority
///
/// Priority is a closed enum upstream, but the mapping tolerates drift: the
/// medium window is the fallback, never an error.
pub fn resolution_hours(priority: TicketPriority) -> i64 {
    match priority {
        TicketPriority::Urgent => 4,
        TicketPriority::High => 24,
        TicketPriority::Medium => 72,
        TicketPriority::Low => 168,
    }
}

/// Resolution window for a priority given as a raw string
///
/// Unrecognized values fall back to the medium window.
pub fn resolution_hours_for(priority: &str) -> i64 {
    priority
        .parse::<TicketPriority>()
        .map(resolution_hours)
        .unwrap_or_else(|_| resolution_hours(TicketPriority::Medium))
}

/// SLA deadline for a ticket created at `from`
pub fn deadline(priority: TicketPriority, from: Timestamp) -> Timestamp {
    from.add_hours(resolution_hours(priority))
}

/// Whether a deadline has been missed as of now
///
/// A ticket without a deadline never breaches.
pub fn is_breached(deadline: Option<&Timestamp>) -> bool {
    is_breached_at(deadline, Timestamp::now())
}

/// Breach predicate against an explicit clock
pub fn is_breached_at(deadline: Option<&Timestamp>, now: Timestamp) -> bool {
    match deadline {
        Some(d) => now > *d,
        None => false,
    }
}

#[cfg(test)]
#[path = "sla_tests.rs"]
mod tests;
