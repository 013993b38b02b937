//! Prometheus metrics for the API service.
//!
//! Metrics live on a service-owned registry (not the global default) so
//! that test harnesses can build multiple instances without registration
//! conflicts.

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Service metrics for observability
pub struct ServiceMetrics {
    registry: Registry,

    /// Webhook deliveries by source and outcome
    /// (processed / duplicate / ignored / failed / rejected)
    pub webhook_requests_total: IntCounterVec,

    /// Explicit replay requests via the retry endpoint
    pub retry_requests_total: IntCounter,

    /// Automation runs triggered
    pub automation_runs_total: IntCounter,

    /// Automation mutations by rule (assigned / closed / breached)
    pub automation_mutations_total: IntCounterVec,

    /// HTTP request latency across all endpoints
    pub http_request_duration_seconds: Histogram,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let webhook_requests_total = IntCounterVec::new(
            Opts::new(
                "caseflow_webhook_requests_total",
                "Webhook deliveries by source and outcome",
            ),
            &["source", "outcome"],
        )?;
        registry.register(Box::new(webhook_requests_total.clone()))?;

        let retry_requests_total = IntCounter::with_opts(Opts::new(
            "caseflow_retry_requests_total",
            "Explicit event replay requests",
        ))?;
        registry.register(Box::new(retry_requests_total.clone()))?;

        let automation_runs_total = IntCounter::with_opts(Opts::new(
            "caseflow_automation_runs_total",
            "Automation engine runs triggered",
        ))?;
        registry.register(Box::new(automation_runs_total.clone()))?;

        let automation_mutations_total = IntCounterVec::new(
            Opts::new(
                "caseflow_automation_mutations_total",
                "Automation mutations by rule",
            ),
            &["rule"],
        )?;
        registry.register(Box::new(automation_mutations_total.clone()))?;

        let http_request_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "caseflow_http_request_duration_seconds",
                "HTTP request processing time",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Arc::new(Self {
            registry,
            webhook_requests_total,
            retry_requests_total,
            automation_runs_total,
            automation_mutations_total,
            http_request_duration_seconds,
        }))
    }

    /// Record one webhook delivery outcome
    pub fn record_webhook(&self, source: &str, outcome: &str) {
        self.webhook_requests_total
            .with_label_values(&[source, outcome])
            .inc();
    }

    /// Record the per-rule counts of one automation run
    pub fn record_automation_run(&self, report: &caseflow_core::AutomationReport) {
        self.automation_runs_total.inc();
        self.automation_mutations_total
            .with_label_values(&["assigned"])
            .inc_by(report.assigned);
        self.automation_mutations_total
            .with_label_values(&["closed"])
            .inc_by(report.closed);
        self.automation_mutations_total
            .with_label_values(&["breached"])
            .inc_by(report.breached);
    }

    /// Render the registry in Prometheus text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
