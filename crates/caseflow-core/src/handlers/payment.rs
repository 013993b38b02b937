//! Payment-processor event handler.
//!
//! Mirrors subscription lifecycle changes into the local subscription
//! records, keyed by the processor's subscription identifier. The handler
//! only ever writes absolute statuses, so duplicate or replayed events
//! converge instead of compounding.

use super::{EventHandler, HandlerError, HandlerReport};
use crate::activity_log::{ActivityLog, NewActivityEntry};
use crate::records::{Subscription, SubscriptionStatus, SubscriptionStore};
use crate::{EventSource, Timestamp};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Event types this handler acts on
const SUPPORTED_EVENTS: &[&str] = &[
    "customer.subscription.created",
    "customer.subscription.updated",
    "customer.subscription.deleted",
    "invoice.paid",
    "invoice.payment_failed",
];

// ============================================================================
// Planning
// ============================================================================

/// Intended mutation derived from one payment event
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlannedMutation {
    /// Create or replace the local record with this status
    Upsert {
        external_id: String,
        status: SubscriptionStatus,
    },

    /// Set the status of an existing record; the record missing locally is
    /// a retryable condition, not a discard
    SetStatus {
        external_id: String,
        status: SubscriptionStatus,
    },
}

/// Extract the processor's subscription identifier from the payload
///
/// The platform's own notifications carry `subscriptionId` at the top
/// level; processor-native payloads nest the object under `data.object`.
fn subscription_id(payload: &serde_json::Value) -> Option<String> {
    payload
        .get("subscriptionId")
        .and_then(|v| v.as_str())
        .or_else(|| {
            payload
                .get("data")
                .and_then(|d| d.get("object"))
                .and_then(|o| o.get("id"))
                .and_then(|v| v.as_str())
        })
        .map(str::to_string)
}

/// Extract the subscription status carried in the payload, if any
fn payload_status(payload: &serde_json::Value) -> Option<SubscriptionStatus> {
    payload
        .get("status")
        .and_then(|v| v.as_str())
        .or_else(|| {
            payload
                .get("data")
                .and_then(|d| d.get("object"))
                .and_then(|o| o.get("status"))
                .and_then(|v| v.as_str())
        })
        .and_then(|s| s.parse().ok())
}

/// Pure mapping from `(event_type, payload)` to the intended mutation
///
/// Returns `None` for event types outside the supported list; every
/// supported type maps to exactly one mutation or a fatal error.
pub(crate) fn plan(
    event_type: &str,
    payload: &serde_json::Value,
) -> Result<Option<PlannedMutation>, HandlerError> {
    if !SUPPORTED_EVENTS.contains(&event_type) {
        return Ok(None);
    }

    let external_id = subscription_id(payload)
        .ok_or_else(|| HandlerError::fatal("payload carries no subscription identifier"))?;

    let mutation = match event_type {
        "customer.subscription.created" | "customer.subscription.updated" => {
            PlannedMutation::Upsert {
                external_id,
                status: payload_status(payload).unwrap_or(SubscriptionStatus::Active),
            }
        }
        "customer.subscription.deleted" => PlannedMutation::SetStatus {
            external_id,
            status: SubscriptionStatus::Canceled,
        },
        "invoice.paid" => PlannedMutation::SetStatus {
            external_id,
            status: SubscriptionStatus::Active,
        },
        "invoice.payment_failed" => PlannedMutation::SetStatus {
            external_id,
            status: SubscriptionStatus::PastDue,
        },
        _ => unreachable!("checked against SUPPORTED_EVENTS above"),
    };

    Ok(Some(mutation))
}

// ============================================================================
// Handler
// ============================================================================

/// Handler for payment-processor notifications
pub struct PaymentEventHandler {
    subscriptions: Arc<dyn SubscriptionStore>,
    activity: Arc<dyn ActivityLog>,
}

impl PaymentEventHandler {
    pub fn new(subscriptions: Arc<dyn SubscriptionStore>, activity: Arc<dyn ActivityLog>) -> Self {
        Self {
            subscriptions,
            activity,
        }
    }
}

#[async_trait]
impl EventHandler for PaymentEventHandler {
    fn source(&self) -> EventSource {
        EventSource::Payment
    }

    fn supported_events(&self) -> &'static [&'static str] {
        SUPPORTED_EVENTS
    }

    #[instrument(skip(self, payload), fields(event_type = %event_type))]
    async fn handle(
        &self,
        event_type: &str,
        payload: &[u8],
    ) -> Result<HandlerReport, HandlerError> {
        let payload: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| HandlerError::fatal(format!("payload is not valid JSON: {}", e)))?;

        let Some(mutation) = plan(event_type, &payload)? else {
            debug!("Unrecognized payment event type; no-op");
            return Ok(HandlerReport::empty());
        };

        let now = Timestamp::now();
        let mut report = HandlerReport::empty();

        match mutation {
            PlannedMutation::Upsert {
                external_id,
                status,
            } => {
                self.subscriptions
                    .upsert(Subscription {
                        external_id: external_id.clone(),
                        status,
                        updated_at: now,
                    })
                    .await?;
                self.activity
                    .append(NewActivityEntry::system(
                        "subscription.status_synced",
                        "subscription",
                        &external_id,
                        serde_json::json!({ "status": status.as_str(), "event_type": event_type }),
                    ))
                    .await?;
                report.push("subscription", external_id, "status_synced");
            }
            PlannedMutation::SetStatus {
                external_id,
                status,
            } => {
                let updated = self
                    .subscriptions
                    .set_status(&external_id, status, now)
                    .await?;
                if !updated {
                    // The subscription may simply not have synced yet;
                    // leave the event retryable rather than discarding it.
                    return Err(HandlerError::retryable(format!(
                        "subscription '{}' not found locally",
                        external_id
                    )));
                }
                self.activity
                    .append(NewActivityEntry::system(
                        "subscription.status_synced",
                        "subscription",
                        &external_id,
                        serde_json::json!({ "status": status.as_str(), "event_type": event_type }),
                    ))
                    .await?;
                report.push("subscription", external_id, "status_synced");
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
#[path = "payment_tests.rs"]
mod tests;
