//! Tests for entity records: ticket SLA wiring, transitions, lead scoring.

use super::*;

// ============================================================================
// Support ticket tests
// ============================================================================

mod support_ticket_tests {
    use super::*;

    /// A new ticket is open, unassigned, and carries a deadline derived
    /// from its priority.
    #[test]
    fn test_new_ticket_fixes_sla_deadline_from_priority() {
        let ticket = SupportTicket::new("Broken checkout", TicketPriority::Urgent);

        assert_eq!(ticket.status, TicketStatus::Open);
        assert!(ticket.assignee_id.is_none());
        assert!(!ticket.sla_breach);

        let deadline = ticket.sla_deadline.expect("deadline must be set");
        let offset = deadline.duration_since(ticket.created_at);
        assert_eq!(offset.as_secs(), 4 * 3600);
    }

    /// Entering Resolved stamps `resolved_at`; entering Closed stamps
    /// `closed_at`.
    #[test]
    fn test_transition_stamps_lifecycle_timestamps() {
        let mut ticket = SupportTicket::new("Slow dashboard", TicketPriority::Medium);
        let now = Timestamp::now();

        ticket.transition(TicketStatus::InProgress, now).unwrap();
        assert!(ticket.resolved_at.is_none());

        ticket.transition(TicketStatus::Resolved, now).unwrap();
        assert_eq!(ticket.resolved_at, Some(now));

        ticket.transition(TicketStatus::Closed, now).unwrap();
        assert_eq!(ticket.closed_at, Some(now));
    }

    /// An illegal transition leaves the ticket untouched.
    #[test]
    fn test_rejected_transition_leaves_status_unchanged() {
        let mut ticket = SupportTicket::new("Login issue", TicketPriority::High);
        let result = ticket.transition(TicketStatus::Closed, Timestamp::now());

        assert!(result.is_err());
        assert_eq!(ticket.status, TicketStatus::Open);
        assert!(ticket.closed_at.is_none());
    }

    /// The deadline does not move when priority changes afterwards.
    #[test]
    fn test_deadline_is_immutable_under_priority_change() {
        let mut ticket = SupportTicket::new("Minor typo", TicketPriority::Low);
        let original = ticket.sla_deadline;

        ticket.priority = TicketPriority::Urgent;

        assert_eq!(ticket.sla_deadline, original);
    }
}

// ============================================================================
// Quote request tests
// ============================================================================

mod quote_request_tests {
    use super::*;

    /// A new quote starts in New with a score derived from intake.
    #[test]
    fn test_new_quote_is_scored_once() {
        let quote = QuoteRequest::new(QuoteIntake {
            name: "Dana".to_string(),
            email: "dana@example.com".to_string(),
            company: Some("Acme".to_string()),
            budget: Some(30_000),
            timeline: Some("ASAP".to_string()),
            message: "x".repeat(250),
            referral: Some("partner".to_string()),
        });

        assert_eq!(quote.status, QuoteStatus::New);
        assert_eq!(quote.lead_score, 100);
        assert_eq!(quote.lead_quality, LeadQuality::Hot);
    }

    /// The quote transition method enforces the table.
    #[test]
    fn test_quote_transition_enforces_table() {
        let mut quote = QuoteRequest::new(QuoteIntake::default());
        let now = Timestamp::now();

        assert!(quote.transition(QuoteStatus::Accepted, now).is_err());
        assert_eq!(quote.status, QuoteStatus::New);

        quote.transition(QuoteStatus::Contacted, now).unwrap();
        assert_eq!(quote.status, QuoteStatus::Contacted);
    }
}

// ============================================================================
// Lead scoring tests
// ============================================================================

mod lead_scoring_tests {
    use super::*;

    /// An empty intake scores zero and lands cold.
    #[test]
    fn test_empty_intake_is_cold() {
        let (score, quality) = QuoteIntake::default().score();
        assert_eq!(score, 0);
        assert_eq!(quality, LeadQuality::Cold);
    }

    /// Budget bands award the documented points.
    #[test]
    fn test_budget_bands() {
        for (budget, expected) in [(25_000, 40), (10_000, 30), (5_000, 20), (1_000, 10), (500, 0)]
        {
            let intake = QuoteIntake {
                budget: Some(budget),
                ..QuoteIntake::default()
            };
            assert_eq!(intake.score().0, expected, "budget {}", budget);
        }
    }

    /// Timeline matching is case-insensitive and keyword based.
    #[test]
    fn test_timeline_urgency() {
        let asap = QuoteIntake {
            timeline: Some("We need this ASAP".to_string()),
            ..QuoteIntake::default()
        };
        assert_eq!(asap.score().0, 25);

        let month = QuoteIntake {
            timeline: Some("within 1 month".to_string()),
            ..QuoteIntake::default()
        };
        assert_eq!(month.score().0, 20);

        let someday = QuoteIntake {
            timeline: Some("no rush".to_string()),
            ..QuoteIntake::default()
        };
        assert_eq!(someday.score().0, 0);
    }

    /// Scoring is deterministic: the same intake always scores the same.
    #[test]
    fn test_scoring_is_deterministic() {
        let intake = QuoteIntake {
            name: "Sam".to_string(),
            email: "sam@example.com".to_string(),
            budget: Some(12_000),
            timeline: Some("this quarter".to_string()),
            message: "A mid-sized message describing the project in some detail.".to_string(),
            ..QuoteIntake::default()
        };
        assert_eq!(intake.score(), intake.score());
        // 30 (budget) + 10 (quarter) + 5 (message >= 50 chars)
        assert_eq!(intake.score().0, 45);
        assert_eq!(intake.score().1, LeadQuality::Warm);
    }

    /// The score is clamped to 100.
    #[test]
    fn test_score_is_clamped() {
        let intake = QuoteIntake {
            company: Some("Globex".to_string()),
            budget: Some(100_000),
            timeline: Some("immediately".to_string()),
            message: "y".repeat(300),
            referral: Some("client".to_string()),
            ..QuoteIntake::default()
        };
        assert_eq!(intake.score().0, 100);
    }
}

// ============================================================================
// Subscription status tests
// ============================================================================

mod subscription_status_tests {
    use super::*;
    use std::str::FromStr;

    /// Processor status strings parse, including the British spelling of
    /// cancelled.
    #[test]
    fn test_status_strings_parse() {
        assert_eq!(
            SubscriptionStatus::from_str("past_due").unwrap(),
            SubscriptionStatus::PastDue
        );
        assert_eq!(
            SubscriptionStatus::from_str("cancelled").unwrap(),
            SubscriptionStatus::Canceled
        );
        assert!(SubscriptionStatus::from_str("on-hold").is_err());
    }
}
