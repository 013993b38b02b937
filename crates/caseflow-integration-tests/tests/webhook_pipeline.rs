//! Integration tests for the webhook intake pipeline, driving the API
//! handlers directly (no network) against fully wired in-memory stores.

mod common;

use axum::extract::{Path, Query, State};
use caseflow_api::{
    list_events, receive_webhook, retry_event, ApiError, EventListParams,
};
use caseflow_core::{
    ActivityLog, EventFilter, EventStore, Subscription, SubscriptionStatus, SubscriptionStore,
    TaskStore, Timestamp,
};
use common::{payment_body, payment_headers, scm_headers, test_app};

/// A subscription cancellation delivered twice cancels the local
/// subscription exactly once, and the second delivery acknowledges as a
/// duplicate.
#[tokio::test]
async fn test_cancellation_delivered_twice_cancels_once() {
    let app = test_app(&[]);
    app.subscriptions
        .upsert(Subscription {
            external_id: "sub_42".to_string(),
            status: SubscriptionStatus::Active,
            updated_at: Timestamp::now(),
        })
        .await
        .unwrap();

    let body = payment_body("evt_1", "customer.subscription.deleted", "sub_42");

    let first = receive_webhook(
        State(app.state.clone()),
        Path("payment".to_string()),
        payment_headers(),
        body.clone(),
    )
    .await
    .unwrap();
    assert_eq!(first.0.status, "processed");

    let second = receive_webhook(
        State(app.state.clone()),
        Path("payment".to_string()),
        payment_headers(),
        body,
    )
    .await
    .unwrap();
    assert_eq!(second.0.status, "duplicate");

    // Exactly one stored event, exactly one mutation, exactly one ledger
    // entry for the subscription.
    let stored = app.event_store.list(&EventFilter::default()).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(
        app.subscriptions.get("sub_42").await.unwrap().unwrap().status,
        SubscriptionStatus::Canceled
    );
    let entries = app.activity.entries_for("subscription", "sub_42").await.unwrap();
    assert_eq!(entries.len(), 1);
}

/// A forged delivery is rejected with nothing stored and nothing mutated.
#[tokio::test]
async fn test_forged_delivery_leaves_no_trace() {
    let app = test_app(&[]);

    let mut headers = axum::http::HeaderMap::new();
    headers.insert("x-payment-webhook-token", "forged-token-value".parse().unwrap());

    let result = receive_webhook(
        State(app.state.clone()),
        Path("payment".to_string()),
        headers,
        payment_body("evt_1", "customer.subscription.deleted", "sub_42"),
    )
    .await;

    assert!(matches!(result, Err(ApiError::SignatureRejected(_))));
    assert!(app
        .event_store
        .list(&EventFilter::default())
        .await
        .unwrap()
        .is_empty());
    assert!(app.activity.all_entries().is_empty());
}

/// A merged pull request completes the task its title references.
#[tokio::test]
async fn test_merged_pull_request_completes_task() {
    let app = test_app(&[]);
    app.tasks
        .insert(caseflow_core::ProjectTask::new("TASK-7", "Build export"))
        .await
        .unwrap();

    let body = serde_json::json!({
        "action": "closed",
        "pull_request": { "title": "Finish export pipeline TASK-7", "merged": true }
    })
    .to_string();
    let body = bytes::Bytes::from(body);

    let response = receive_webhook(
        State(app.state.clone()),
        Path("scm".to_string()),
        scm_headers("pull_request", "delivery-1", &body),
        body,
    )
    .await
    .unwrap();
    assert_eq!(response.0.status, "processed");

    let task = app.tasks.get_by_reference("TASK-7").await.unwrap().unwrap();
    assert_eq!(task.status, caseflow_core::TaskStatus::Completed);
}

/// An unhandled event type is acknowledged and recorded as processed, not
/// as a failure.
#[tokio::test]
async fn test_long_tail_event_type_acknowledged() {
    let app = test_app(&[]);

    let body = bytes::Bytes::from_static(b"{}");
    let response = receive_webhook(
        State(app.state.clone()),
        Path("scm".to_string()),
        scm_headers("star_created", "delivery-2", &body),
        body,
    )
    .await
    .unwrap();
    assert_eq!(response.0.status, "ignored");

    let stored = app.event_store.list(&EventFilter::default()).await.unwrap();
    assert!(stored[0].processed);
    assert!(stored[0].error.is_none());
}

/// A failed event shows up in the unprocessed listing, replays to success
/// through the retry endpoint once the record syncs, and then disappears
/// from the failure view.
#[tokio::test]
async fn test_failure_triage_and_replay_flow() {
    let app = test_app(&[]);

    let result = receive_webhook(
        State(app.state.clone()),
        Path("payment".to_string()),
        payment_headers(),
        payment_body("evt_9", "invoice.payment_failed", "sub_9"),
    )
    .await;
    let Err(ApiError::HandlerFailed { event_id, .. }) = result else {
        panic!("expected HandlerFailed");
    };

    // The operator sees it in the unprocessed listing.
    let listing = list_events(
        State(app.state.clone()),
        Query(EventListParams {
            processed: Some(false),
            ..EventListParams::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(listing.0.count, 1);
    assert!(listing.0.events[0].error.is_some());

    // The subscription syncs; replay recovers the event.
    app.subscriptions
        .upsert(Subscription {
            external_id: "sub_9".to_string(),
            status: SubscriptionStatus::Active,
            updated_at: Timestamp::now(),
        })
        .await
        .unwrap();

    let (status, body) = retry_event(State(app.state.clone()), Path(event_id.to_string()))
        .await
        .unwrap();
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body.0.status, "reprocessed");
    assert_eq!(
        app.subscriptions.get("sub_9").await.unwrap().unwrap().status,
        SubscriptionStatus::PastDue
    );

    let unprocessed = list_events(
        State(app.state),
        Query(EventListParams {
            processed: Some(false),
            ..EventListParams::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(unprocessed.0.count, 0);
}
