//! Tests for the retry coordinator: idempotent no-op on processed events,
//! recovery of failed events, and rejection of unknown IDs.

use super::*;
use crate::adapters::{
    MemoryActivityLog, MemoryEventStore, MemorySubscriptionStore, MemoryTaskStore,
};
use crate::handlers::{HandlerRegistry, PaymentEventHandler, ScmEventHandler};
use crate::records::{Subscription, SubscriptionStatus, SubscriptionStore};
use crate::webhook::{DispatchResult, WebhookDispatcher};
use crate::{EventId, EventSource, Timestamp};
use bytes::Bytes;
use std::sync::Arc;

// ============================================================================
// Helpers
// ============================================================================

struct Fixture {
    coordinator: RetryCoordinator,
    dispatcher: Arc<WebhookDispatcher>,
    subscriptions: Arc<MemorySubscriptionStore>,
}

fn fixture() -> Fixture {
    let event_store = Arc::new(MemoryEventStore::new());
    let subscriptions = Arc::new(MemorySubscriptionStore::new());
    let tasks = Arc::new(MemoryTaskStore::new());
    let activity = Arc::new(MemoryActivityLog::new());

    let mut handlers = HandlerRegistry::new();
    handlers.register(Arc::new(PaymentEventHandler::new(
        subscriptions.clone(),
        activity.clone(),
    )));
    handlers.register(Arc::new(ScmEventHandler::new(tasks, activity)));

    let dispatcher = Arc::new(WebhookDispatcher::new(event_store.clone(), handlers));
    Fixture {
        coordinator: RetryCoordinator::new(event_store, dispatcher.clone()),
        dispatcher,
        subscriptions,
    }
}

fn cancellation_payload(subscription_id: &str) -> Bytes {
    Bytes::from(format!(
        r#"{{"id":"evt_1","type":"customer.subscription.deleted","subscriptionId":"{}"}}"#,
        subscription_id
    ))
}

// ============================================================================
// retry tests
// ============================================================================

mod retry_tests {
    use super::*;

    /// Retrying an unknown event ID is rejected outright.
    #[tokio::test]
    async fn test_unknown_event_id_rejected() {
        let fx = fixture();
        let result = fx.coordinator.retry(EventId::new()).await;
        assert!(matches!(result, Err(RetryError::NotFound { .. })));
    }

    /// Retrying a processed event is a success no-op: the handler does not
    /// run and the entity state does not change.
    #[tokio::test]
    async fn test_processed_event_retry_is_noop() {
        let fx = fixture();
        fx.subscriptions
            .upsert(Subscription {
                external_id: "sub_42".to_string(),
                status: SubscriptionStatus::Active,
                updated_at: Timestamp::now(),
            })
            .await
            .unwrap();

        let dispatched = fx
            .dispatcher
            .receive(
                EventSource::Payment,
                "customer.subscription.deleted",
                "evt_1",
                cancellation_payload("sub_42"),
            )
            .await
            .unwrap();
        assert!(matches!(dispatched, DispatchResult::Processed { .. }));

        // Flip the subscription back; a re-invoked handler would cancel it
        // again, so staying Active proves the handler did not run.
        fx.subscriptions
            .upsert(Subscription {
                external_id: "sub_42".to_string(),
                status: SubscriptionStatus::Active,
                updated_at: Timestamp::now(),
            })
            .await
            .unwrap();

        let outcome = fx.coordinator.retry(dispatched.event_id()).await.unwrap();
        assert!(matches!(outcome, RetryOutcome::AlreadyProcessed { .. }));

        let subscription = fx.subscriptions.get("sub_42").await.unwrap().unwrap();
        assert_eq!(subscription.status, SubscriptionStatus::Active);
    }

    /// A failed event can be replayed to success once the missing record
    /// has synced, using only the stored payload.
    #[tokio::test]
    async fn test_failed_event_recovers_after_sync() {
        let fx = fixture();

        let dispatched = fx
            .dispatcher
            .receive(
                EventSource::Payment,
                "customer.subscription.deleted",
                "evt_1",
                cancellation_payload("sub_42"),
            )
            .await
            .unwrap();
        assert!(matches!(dispatched, DispatchResult::Failed { .. }));

        // The subscription record arrives out of band.
        fx.subscriptions
            .upsert(Subscription {
                external_id: "sub_42".to_string(),
                status: SubscriptionStatus::Active,
                updated_at: Timestamp::now(),
            })
            .await
            .unwrap();

        let outcome = fx.coordinator.retry(dispatched.event_id()).await.unwrap();
        let RetryOutcome::Reprocessed { mutations, .. } = outcome else {
            panic!("expected Reprocessed, got {:?}", outcome);
        };
        assert_eq!(mutations, 1);

        let subscription = fx.subscriptions.get("sub_42").await.unwrap().unwrap();
        assert_eq!(subscription.status, SubscriptionStatus::Canceled);
    }

    /// A replay that fails again updates the stored error and reports it.
    #[tokio::test]
    async fn test_replay_failure_reports_error() {
        let fx = fixture();

        let dispatched = fx
            .dispatcher
            .receive(
                EventSource::Payment,
                "customer.subscription.deleted",
                "evt_1",
                cancellation_payload("sub_never"),
            )
            .await
            .unwrap();

        let outcome = fx.coordinator.retry(dispatched.event_id()).await.unwrap();
        let RetryOutcome::Failed { retryable, .. } = outcome else {
            panic!("expected Failed, got {:?}", outcome);
        };
        assert!(retryable);
    }
}
