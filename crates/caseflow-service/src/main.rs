//! # Caseflow Service
//!
//! Binary entry point for the Caseflow HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes logging
//! - Wires signature verifiers, stores, handlers, and the automation engine
//! - Starts the HTTP server from caseflow-api

use caseflow_api::{start_server, AppState, SecretConfig, ServiceConfig, ServiceMetrics};
use caseflow_core::adapters::{
    MemoryActivityLog, MemoryEventStore, MemorySubscriptionStore, MemoryTaskStore,
    MemoryTicketStore,
};
use caseflow_core::handlers::{HandlerRegistry, PaymentEventHandler, ScmEventHandler};
use caseflow_core::webhook::{HmacSignatureVerifier, TokenSignatureVerifier};
use caseflow_core::{
    AutomationEngine, EventSource, RetryCoordinator, SignatureVerifier, VerifierRegistry,
    WebhookDispatcher,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caseflow_service=info,caseflow_api=info,caseflow_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Caseflow Service");

    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order — later sources override earlier ones):
    //  1. /etc/caseflow/service.yaml        — system-wide defaults
    //  2. ./config/service.yaml             — deployment-local override
    //  3. Path given by CASEFLOW_CONFIG_FILE env — operator-specified file
    //  4. Environment variables prefixed CASEFLOW__ (double-underscore
    //     separator), e.g. CASEFLOW__SERVER__PORT=9090 sets server.port
    //
    // Every field carries a serde default, so an entirely unconfigured
    // environment produces a valid service config. A malformed file or an
    // uncoercible environment variable IS a hard error because it indicates
    // deliberate-but-broken operator configuration.
    // -------------------------------------------------------------------------
    let mut config_builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/caseflow/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Ok(explicit_path) = std::env::var("CASEFLOW_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            config_builder = config_builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
            info!(path = %explicit_path, "Loading configuration from explicit path");
        }
    }

    let config = match config_builder
        .add_source(config::Environment::with_prefix("CASEFLOW").separator("__"))
        .build()
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Failed to build configuration; aborting");
            std::process::exit(3);
        }
    };

    let service_config: ServiceConfig = match config.try_deserialize() {
        Ok(sc) => sc,
        Err(e) => {
            error!(
                error = %e,
                "Could not deserialize service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(3);
        }
    };

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    // -------------------------------------------------------------------------
    // Build signature verifiers
    //
    // A source whose secret is not configured gets no verifier, which makes
    // its endpoint fail closed: every delivery is rejected as
    // unauthenticated until the secret is set.
    // -------------------------------------------------------------------------
    let mut verifiers = VerifierRegistry::new();

    match resolve_secret(service_config.webhooks.payment_token.as_ref(), "payment") {
        Some(token) => {
            let verifier: Arc<dyn SignatureVerifier> =
                Arc::new(TokenSignatureVerifier::new(token));
            verifiers.register(EventSource::Payment, verifier);
            info!("Registered payment webhook verifier");
        }
        None => warn!(
            "No payment webhook token configured; \
             /webhooks/payment will reject every delivery"
        ),
    }

    match resolve_secret(service_config.webhooks.scm_secret.as_ref(), "scm") {
        Some(secret) => {
            let verifier: Arc<dyn SignatureVerifier> = Arc::new(HmacSignatureVerifier::new(secret));
            verifiers.register(EventSource::Scm, verifier);
            info!("Registered SCM webhook verifier");
        }
        None => warn!(
            "No SCM webhook secret configured; \
             /webhooks/scm will reject every delivery"
        ),
    }

    let scheduler_token =
        match service_config.automation.scheduler_token.as_ref() {
            Some(secret) => match secret.resolve() {
                Ok(token) => Some(token),
                Err(e) => {
                    error!(error = %e, "Scheduler token configured but unresolvable; aborting");
                    std::process::exit(3);
                }
            },
            None => {
                warn!("No scheduler token configured; /automation/run is disabled");
                None
            }
        };

    // -------------------------------------------------------------------------
    // Wire stores, handlers, and the engine
    //
    // The in-memory adapters back the default deployment; a database-backed
    // store implements the same traits and swaps in here.
    // -------------------------------------------------------------------------
    let event_store = Arc::new(MemoryEventStore::new());
    let tickets = Arc::new(MemoryTicketStore::new());
    let subscriptions = Arc::new(MemorySubscriptionStore::new());
    let tasks = Arc::new(MemoryTaskStore::new());
    let activity = Arc::new(MemoryActivityLog::new());

    let mut handlers = HandlerRegistry::new();
    handlers.register(Arc::new(PaymentEventHandler::new(
        subscriptions,
        activity.clone(),
    )));
    handlers.register(Arc::new(ScmEventHandler::new(tasks, activity.clone())));

    let dispatcher = Arc::new(WebhookDispatcher::new(event_store.clone(), handlers));
    let retry = Arc::new(RetryCoordinator::new(event_store.clone(), dispatcher.clone()));
    let engine = Arc::new(AutomationEngine::new(
        tickets,
        activity,
        service_config.automation.engine_config(),
    ));

    let metrics = match ServiceMetrics::new() {
        Ok(metrics) => metrics,
        Err(e) => {
            error!(error = %e, "Failed to initialize metrics; aborting");
            std::process::exit(3);
        }
    };

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        "Starting HTTP server"
    );

    let state = AppState::new(
        service_config,
        verifiers,
        dispatcher,
        retry,
        engine,
        event_store,
        metrics,
        scheduler_token,
    );

    if let Err(e) = start_server(state).await {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            caseflow_api::ServiceError::BindFailed { .. } => 1,
            caseflow_api::ServiceError::ServerFailed { .. } => 2,
            caseflow_api::ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}

// ============================================================================
// Private helpers
// ============================================================================

/// Resolve an optional secret, logging (not aborting) when it cannot be
/// resolved — the affected source simply stays disabled.
fn resolve_secret(secret: Option<&SecretConfig>, source: &str) -> Option<String> {
    match secret?.resolve() {
        Ok(value) => Some(value.into_inner()),
        Err(e) => {
            error!(
                source = %source,
                error = %e,
                "Webhook secret configured but unresolvable; source disabled"
            );
            None
        }
    }
}
