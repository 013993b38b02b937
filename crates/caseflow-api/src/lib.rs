//! # Caseflow HTTP Service
//!
//! HTTP layer for the Caseflow event ingestion and automation subsystem.
//!
//! This service provides:
//! - Per-source webhook intake endpoints with signature verification
//! - Webhook introspection metadata
//! - Stored-event listing and explicit replay for operator triage
//! - The automation trigger invoked by an external scheduler
//! - Health endpoints and Prometheus metrics

// Public modules
pub mod config;
pub mod errors;
pub mod metrics;
pub mod responses;

use axum::{
    extract::{DefaultBodyLimit, Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use caseflow_core::webhook::EventMetadata;
use caseflow_core::{
    AutomationEngine, DispatchResult, EventFilter, EventId, EventSource, EventStore,
    RetryCoordinator, RetryError, RetryOutcome, Timestamp, VerifierRegistry, WebhookDispatcher,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

pub use config::{AutomationSettings, SecretConfig, SecretString, ServerConfig, ServiceConfig};
pub use errors::{ApiError, ConfigError, ServiceError};
pub use metrics::ServiceMetrics;
pub use responses::{
    EventListParams, EventListResponse, EventSummary, HealthResponse, ReadinessResponse,
    RetryResponse, WebhookEndpointInfo, WebhookResponse,
};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration the service was started with
    pub config: ServiceConfig,

    /// Per-source signature verifiers
    pub verifiers: VerifierRegistry,

    /// Webhook intake pipeline
    pub dispatcher: Arc<WebhookDispatcher>,

    /// Explicit replay coordinator
    pub retry: Arc<RetryCoordinator>,

    /// Scheduled automation rules
    pub engine: Arc<AutomationEngine>,

    /// Stored-event queries for the listing endpoint
    pub event_store: Arc<dyn EventStore>,

    /// Prometheus metrics
    pub metrics: Arc<ServiceMetrics>,

    /// Resolved scheduler bearer token; `None` disables the automation
    /// trigger endpoint
    pub scheduler_token: Option<SecretString>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ServiceConfig,
        verifiers: VerifierRegistry,
        dispatcher: Arc<WebhookDispatcher>,
        retry: Arc<RetryCoordinator>,
        engine: Arc<AutomationEngine>,
        event_store: Arc<dyn EventStore>,
        metrics: Arc<ServiceMetrics>,
        scheduler_token: Option<SecretString>,
    ) -> Self {
        Self {
            config,
            verifiers,
            dispatcher,
            retry,
            engine,
            event_store,
            metrics,
            scheduler_token,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create the HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new()
        .route("/webhooks/{source}", post(receive_webhook))
        .route("/webhooks", get(list_webhook_endpoints));

    let api_routes = Router::new().route("/api/events", get(list_events));

    let admin_routes = Router::new()
        .route("/admin/events/{event_id}/retry", post(retry_event))
        .route("/automation/run", post(run_automation));

    let health_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/ready", get(handle_readiness_check))
        .route("/metrics", get(metrics_endpoint));

    Router::new()
        .merge(webhook_routes)
        .merge(api_routes)
        .merge(admin_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .into_inner(),
        )
        .with_state(state)
}

/// Start the HTTP server with graceful shutdown
pub async fn start_server(state: AppState) -> Result<(), ServiceError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.server.port));
    let shutdown_timeout =
        std::time::Duration::from_secs(state.config.server.shutdown_timeout_seconds);

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: addr.to_string(),
            message: e.to_string(),
        })?;

    info!("Starting HTTP server on {}", addr);

    let shutdown_signal = async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C signal handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT, initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Receive one webhook notification for a source
///
/// Order is fixed by the intake contract: verify the signature against the
/// raw body first (a forgery is rejected with no side effect at all), then
/// extract metadata, then hand off to the dispatcher which deduplicates,
/// persists, and invokes the handler.
#[instrument(skip(state, headers, body), fields(source = %source))]
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(source): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let source: EventSource = source
        .parse()
        .map_err(|_| ApiError::UnknownSource {
            source_name: source,
        })?;

    let header_map = lowercase_headers(&headers);

    if let Err(error) = state.verifiers.verify(source, &header_map, &body) {
        state.metrics.record_webhook(source.as_str(), "rejected");
        return Err(ApiError::SignatureRejected(error));
    }

    let meta = EventMetadata::extract(source, &header_map, &body)?;

    let result = state
        .dispatcher
        .receive(source, &meta.event_type, &meta.external_event_id, body)
        .await?;

    match result {
        DispatchResult::Processed {
            event_id,
            mutations,
        } => {
            state.metrics.record_webhook(source.as_str(), "processed");
            Ok(Json(WebhookResponse {
                event_id,
                status: "processed".to_string(),
                message: format!("Event processed with {} mutation(s)", mutations),
            }))
        }
        DispatchResult::Duplicate { event_id } => {
            state.metrics.record_webhook(source.as_str(), "duplicate");
            Ok(Json(WebhookResponse {
                event_id,
                status: "duplicate".to_string(),
                message: "Event already received".to_string(),
            }))
        }
        DispatchResult::Ignored { event_id } => {
            state.metrics.record_webhook(source.as_str(), "ignored");
            Ok(Json(WebhookResponse {
                event_id,
                status: "ignored".to_string(),
                message: format!("Event type '{}' is not handled", meta.event_type),
            }))
        }
        DispatchResult::Failed {
            event_id,
            error,
            retryable,
        } => {
            state.metrics.record_webhook(source.as_str(), "failed");
            Err(ApiError::HandlerFailed {
                event_id,
                error,
                retryable,
            })
        }
    }
}

/// Static introspection metadata for every registered source
#[instrument(skip(state))]
pub async fn list_webhook_endpoints(State(state): State<AppState>) -> Json<Vec<WebhookEndpointInfo>> {
    let endpoints = state
        .dispatcher
        .handlers()
        .descriptors()
        .into_iter()
        .map(|(source, events)| WebhookEndpointInfo {
            source,
            endpoint: format!("/webhooks/{}", source),
            supported_events: events.iter().map(|e| e.to_string()).collect(),
            status: if state.verifiers.contains(source) {
                "active".to_string()
            } else {
                "missing_secret".to_string()
            },
        })
        .collect();
    Json(endpoints)
}

// ============================================================================
// Admin Handlers
// ============================================================================

/// Replay a stored event through its handler
#[instrument(skip(state))]
pub async fn retry_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<(StatusCode, Json<RetryResponse>), ApiError> {
    let parsed: EventId = event_id
        .parse()
        .map_err(|_| ApiError::InvalidRequest(caseflow_core::ValidationError::InvalidFormat {
            field: "event_id".to_string(),
            message: "must be a ULID".to_string(),
        }))?;

    state.metrics.retry_requests_total.inc();

    match state.retry.retry(parsed).await {
        Ok(RetryOutcome::AlreadyProcessed { event_id }) => Ok((
            StatusCode::OK,
            Json(RetryResponse {
                event_id: event_id.to_string(),
                status: "already_processed".to_string(),
                message: "Event was already processed; handler not re-invoked".to_string(),
            }),
        )),
        Ok(RetryOutcome::Reprocessed {
            event_id,
            mutations,
        }) => Ok((
            StatusCode::OK,
            Json(RetryResponse {
                event_id: event_id.to_string(),
                status: "reprocessed".to_string(),
                message: format!("Event replayed with {} mutation(s)", mutations),
            }),
        )),
        Ok(RetryOutcome::Failed {
            event_id, error, ..
        }) => Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(RetryResponse {
                event_id: event_id.to_string(),
                status: "failed".to_string(),
                message: error,
            }),
        )),
        Err(RetryError::NotFound { event_id }) => Ok((
            StatusCode::NOT_FOUND,
            Json(RetryResponse {
                event_id: event_id.to_string(),
                status: "not_found".to_string(),
                message: "No stored event with this ID".to_string(),
            }),
        )),
        Err(RetryError::NoHandler {
            event_id,
            event_source,
        }) => Ok((
            StatusCode::CONFLICT,
            Json(RetryResponse {
                event_id: event_id.to_string(),
                status: "no_handler".to_string(),
                message: format!("No handler registered for source '{}'", event_source),
            }),
        )),
        Err(RetryError::Store(error)) => Err(ApiError::StoreUnavailable(error)),
    }
}

/// Run the automation rules once
///
/// Guarded by the scheduler's bearer token; intended to be invoked by the
/// external scheduler only, which is also responsible for never running two
/// batches concurrently.
#[instrument(skip(state, headers))]
pub async fn run_automation(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<caseflow_core::AutomationReport>, ApiError> {
    let expected = state
        .scheduler_token
        .as_ref()
        .ok_or(ApiError::AutomationDisabled)?;
    authorize_bearer(&headers, expected.expose())?;

    let report = state.engine.run().await;
    state.metrics.record_automation_run(&report);
    Ok(Json(report))
}

/// Check the `Authorization: Bearer <token>` header in constant time
fn authorize_bearer(headers: &HeaderMap, expected: &str) -> Result<(), ApiError> {
    let presented = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    if presented.len() != expected.len() {
        return Err(ApiError::Unauthorized);
    }
    if presented.as_bytes().ct_eq(expected.as_bytes()).into() {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

// ============================================================================
// Event Listing
// ============================================================================

/// List stored events, newest first, for operator triage
#[instrument(skip(state))]
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<EventListParams>,
) -> Result<Json<EventListResponse>, ApiError> {
    let source = match params.source.as_deref() {
        Some(raw) => Some(raw.parse::<EventSource>().map_err(|_| {
            ApiError::UnknownSource {
                source_name: raw.to_string(),
            }
        })?),
        None => None,
    };

    let filter = EventFilter {
        source,
        processed: params.processed,
        limit: params.limit,
    };

    let events = state.event_store.list(&filter).await?;
    let events: Vec<EventSummary> = events.into_iter().map(EventSummary::from).collect();
    Ok(Json(EventListResponse {
        count: events.len(),
        events,
    }))
}

// ============================================================================
// Health and Observability
// ============================================================================

/// Liveness check
pub async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Timestamp::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check for load balancers
pub async fn handle_readiness_check() -> Json<ReadinessResponse> {
    Json(ReadinessResponse {
        ready: true,
        timestamp: Timestamp::now(),
    })
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .render()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Record request latency into the service histogram
async fn metrics_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let timer = state.metrics.http_request_duration_seconds.start_timer();
    let response = next.run(request).await;
    timer.observe_duration();
    response
}

// ============================================================================
// Helpers
// ============================================================================

/// Lowercase header map for the core's source-agnostic parsing
fn lowercase_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_lowercase(),
                v.to_str().unwrap_or("").to_string(),
            )
        })
        .collect()
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
