//! Shared fixture for integration tests: a fully wired application state
//! over in-memory stores, plus helpers to build signed deliveries.

use axum::http::HeaderMap;
use bytes::Bytes;
use caseflow_api::{AppState, SecretString, ServiceConfig, ServiceMetrics};
use caseflow_core::adapters::{
    MemoryActivityLog, MemoryEventStore, MemorySubscriptionStore, MemoryTaskStore,
    MemoryTicketStore,
};
use caseflow_core::handlers::{HandlerRegistry, PaymentEventHandler, ScmEventHandler};
use caseflow_core::webhook::{HmacSignatureVerifier, TokenSignatureVerifier};
use caseflow_core::{
    AutomationConfig, AutomationEngine, EventSource, RetryCoordinator, VerifierRegistry,
    WebhookDispatcher,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

pub const PAYMENT_TOKEN: &str = "test-payment-token";
pub const SCM_SECRET: &str = "test-scm-secret";
pub const SCHEDULER_TOKEN: &str = "test-scheduler-token";

/// Everything a test needs to drive the API and observe the stores
pub struct TestApp {
    pub state: AppState,
    pub event_store: Arc<MemoryEventStore>,
    pub tickets: Arc<MemoryTicketStore>,
    pub subscriptions: Arc<MemorySubscriptionStore>,
    pub tasks: Arc<MemoryTaskStore>,
    pub activity: Arc<MemoryActivityLog>,
}

/// Build a fully wired test application with the given assignee pool
pub fn test_app(assignees: &[&str]) -> TestApp {
    let event_store = Arc::new(MemoryEventStore::new());
    let tickets = Arc::new(MemoryTicketStore::new());
    let subscriptions = Arc::new(MemorySubscriptionStore::new());
    let tasks = Arc::new(MemoryTaskStore::new());
    let activity = Arc::new(MemoryActivityLog::new());

    let mut handlers = HandlerRegistry::new();
    handlers.register(Arc::new(PaymentEventHandler::new(
        subscriptions.clone(),
        activity.clone(),
    )));
    handlers.register(Arc::new(ScmEventHandler::new(
        tasks.clone(),
        activity.clone(),
    )));

    let mut verifiers = VerifierRegistry::new();
    verifiers.register(
        EventSource::Payment,
        Arc::new(TokenSignatureVerifier::new(PAYMENT_TOKEN.to_string())),
    );
    verifiers.register(
        EventSource::Scm,
        Arc::new(HmacSignatureVerifier::new(SCM_SECRET.to_string())),
    );

    let dispatcher = Arc::new(WebhookDispatcher::new(event_store.clone(), handlers));
    let retry = Arc::new(RetryCoordinator::new(
        event_store.clone(),
        dispatcher.clone(),
    ));
    let engine = Arc::new(AutomationEngine::new(
        tickets.clone(),
        activity.clone(),
        AutomationConfig {
            assignees: assignees.iter().map(|a| a.to_string()).collect(),
        },
    ));

    let state = AppState::new(
        ServiceConfig::default(),
        verifiers,
        dispatcher,
        retry,
        engine,
        event_store.clone(),
        ServiceMetrics::new().expect("metrics registry"),
        Some(SecretString::new(SCHEDULER_TOKEN.to_string())),
    );

    TestApp {
        state,
        event_store,
        tickets,
        subscriptions,
        tasks,
        activity,
    }
}

/// Headers for an authenticated payment delivery
pub fn payment_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-payment-webhook-token", PAYMENT_TOKEN.parse().unwrap());
    headers
}

/// Headers for a signed SCM delivery
pub fn scm_headers(event_type: &str, delivery: &str, body: &[u8]) -> HeaderMap {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(SCM_SECRET.as_bytes()).unwrap();
    mac.update(body);
    let signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

    let mut headers = HeaderMap::new();
    headers.insert("x-scm-event", event_type.parse().unwrap());
    headers.insert("x-scm-delivery", delivery.parse().unwrap());
    headers.insert("x-scm-signature-256", signature.parse().unwrap());
    headers
}

/// Headers carrying the scheduler bearer token
pub fn scheduler_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        format!("Bearer {}", SCHEDULER_TOKEN).parse().unwrap(),
    );
    headers
}

/// A payment-processor notification body
pub fn payment_body(event_id: &str, event_type: &str, subscription_id: &str) -> Bytes {
    Bytes::from(
        serde_json::json!({
            "id": event_id,
            "type": event_type,
            "subscriptionId": subscription_id,
        })
        .to_string(),
    )
}
