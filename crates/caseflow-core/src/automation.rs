//! # Automation Engine
//!
//! Scheduled batch rules over open tickets: round-robin auto-assignment,
//! auto-close of stale resolved tickets, and SLA-breach flagging.
//!
//! The engine is invoked by an external scheduler (the `/automation/run`
//! endpoint); it does not schedule itself and does not guard against
//! overlapping runs — at-most-one-concurrent-run is the scheduler's
//! contract. The three rules act on disjoint status sets, so within one
//! run they cannot race each other over a ticket.
//!
//! Failure isolation is per entity and per rule: one ticket failing to
//! update never aborts the rest of its rule, and one rule failing to list
//! its tickets never blocks the other two.

use crate::activity_log::{ActivityLog, NewActivityEntry};
use crate::records::{TicketStatus, TicketStore};
use crate::sla;
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Days a resolved ticket waits before auto-close
pub const AUTO_CLOSE_GRACE_DAYS: i64 = 3;

// ============================================================================
// Configuration and Report
// ============================================================================

/// Static configuration for an engine instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Pool of eligible assignees for auto-assignment, in rotation order.
    /// An empty pool disables the auto-assign rule.
    pub assignees: Vec<String>,
}

/// Per-rule counts from one engine run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationReport {
    /// Tickets assigned by the auto-assign rule
    pub assigned: u64,

    /// Tickets closed by the auto-close rule
    pub closed: u64,

    /// Tickets newly flagged as SLA-breached
    pub breached: u64,

    /// Tickets skipped because their field state was inconsistent
    pub skipped: u64,

    /// Per-entity or per-rule failures that were isolated and logged
    pub failures: u64,
}

// ============================================================================
// Engine
// ============================================================================

/// The scheduled rules processor
pub struct AutomationEngine {
    tickets: Arc<dyn TicketStore>,
    activity: Arc<dyn ActivityLog>,
    config: AutomationConfig,
}

impl AutomationEngine {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        activity: Arc<dyn ActivityLog>,
        config: AutomationConfig,
    ) -> Self {
        Self {
            tickets,
            activity,
            config,
        }
    }

    /// Execute one batch run of all three rules
    ///
    /// Never fails: every error is isolated, logged, and counted in the
    /// report.
    #[instrument(skip(self))]
    pub async fn run(&self) -> AutomationReport {
        let now = Timestamp::now();
        let mut report = AutomationReport::default();

        self.auto_assign(now, &mut report).await;
        self.auto_close(now, &mut report).await;
        self.flag_sla_breaches(now, &mut report).await;

        info!(
            assigned = report.assigned,
            closed = report.closed,
            breached = report.breached,
            skipped = report.skipped,
            failures = report.failures,
            "Automation run complete"
        );
        report
    }

    /// Assign every open, unassigned ticket round-robin across the pool
    ///
    /// The rotation index is the number of assignments made in this run;
    /// it deliberately restarts at zero each run, so fairness is per-run,
    /// not global.
    async fn auto_assign(&self, now: Timestamp, report: &mut AutomationReport) {
        if self.config.assignees.is_empty() {
            return;
        }

        let open = match self.tickets.list_by_status(&[TicketStatus::Open]).await {
            Ok(tickets) => tickets,
            Err(error) => {
                warn!(error = %error, "Auto-assign could not list open tickets; rule skipped");
                report.failures += 1;
                return;
            }
        };

        let mut rotation = 0usize;
        for mut ticket in open {
            if ticket.assignee_id.is_some() {
                continue;
            }

            let assignee = self.config.assignees[rotation % self.config.assignees.len()].clone();
            ticket.assignee_id = Some(assignee.clone());
            ticket.updated_at = now;

            if let Err(error) = self.tickets.update(&ticket).await {
                warn!(ticket_id = %ticket.id, error = %error, "Auto-assign update failed");
                report.failures += 1;
                continue;
            }

            rotation += 1;
            report.assigned += 1;
            self.log_or_count(
                NewActivityEntry::system(
                    "ticket.auto_assigned",
                    "ticket",
                    ticket.id.to_string(),
                    serde_json::json!({ "assignee": assignee }),
                ),
                report,
            )
            .await;
        }
    }

    /// Close resolved tickets whose grace period has elapsed
    async fn auto_close(&self, now: Timestamp, report: &mut AutomationReport) {
        let resolved = match self.tickets.list_by_status(&[TicketStatus::Resolved]).await {
            Ok(tickets) => tickets,
            Err(error) => {
                warn!(error = %error, "Auto-close could not list resolved tickets; rule skipped");
                report.failures += 1;
                return;
            }
        };

        let cutoff = now.sub_days(AUTO_CLOSE_GRACE_DAYS);
        for mut ticket in resolved {
            let resolved_at = match ticket.resolved_at {
                Some(at) => at,
                None => {
                    // Resolved without a resolution time is an inconsistent
                    // record; flag it for a human instead of guessing.
                    warn!(ticket_id = %ticket.id, "Resolved ticket has no resolved_at; skipped");
                    report.skipped += 1;
                    continue;
                }
            };

            if resolved_at >= cutoff {
                continue;
            }

            if let Err(error) = ticket.transition(TicketStatus::Closed, now) {
                warn!(ticket_id = %ticket.id, error = %error, "Auto-close transition rejected");
                report.skipped += 1;
                continue;
            }

            if let Err(error) = self.tickets.update(&ticket).await {
                warn!(ticket_id = %ticket.id, error = %error, "Auto-close update failed");
                report.failures += 1;
                continue;
            }

            report.closed += 1;
            self.log_or_count(
                NewActivityEntry::system(
                    "ticket.auto_closed",
                    "ticket",
                    ticket.id.to_string(),
                    serde_json::json!({ "resolved_at": resolved_at.to_rfc3339() }),
                ),
                report,
            )
            .await;
        }
    }

    /// Flag SLA breaches on tickets still being worked
    ///
    /// The `sla_breach` flag latches: once set it filters the ticket out of
    /// every later run, so the breach is recorded exactly once.
    async fn flag_sla_breaches(&self, now: Timestamp, report: &mut AutomationReport) {
        let open = match self.tickets.list_by_status(TicketStatus::open_set()).await {
            Ok(tickets) => tickets,
            Err(error) => {
                warn!(error = %error, "Breach detection could not list open tickets; rule skipped");
                report.failures += 1;
                return;
            }
        };

        for mut ticket in open {
            if ticket.sla_breach || !sla::is_breached_at(ticket.sla_deadline.as_ref(), now) {
                continue;
            }

            ticket.sla_breach = true;
            ticket.sla_breached_at = Some(now);
            ticket.updated_at = now;

            if let Err(error) = self.tickets.update(&ticket).await {
                warn!(ticket_id = %ticket.id, error = %error, "Breach flag update failed");
                report.failures += 1;
                continue;
            }

            report.breached += 1;
            self.log_or_count(
                NewActivityEntry::system(
                    "ticket.sla_breached",
                    "ticket",
                    ticket.id.to_string(),
                    serde_json::json!({
                        "deadline": ticket.sla_deadline.map(|d| d.to_rfc3339()),
                        "priority": ticket.priority.as_str(),
                    }),
                ),
                report,
            )
            .await;
        }
    }

    /// Append a ledger entry, downgrading failures to a counted warning
    async fn log_or_count(&self, entry: NewActivityEntry, report: &mut AutomationReport) {
        if let Err(error) = self.activity.append(entry).await {
            warn!(error = %error, "Activity log append failed");
            report.failures += 1;
        }
    }
}

#[cfg(test)]
#[path = "automation_tests.rs"]
mod tests;
