//! Source-control event handler.
//!
//! Completes tracked project tasks when the work referencing them lands:
//! a merged pull request whose title names a task, or a push whose commit
//! messages do. References follow the `TASK-<number>` convention (the `#`
//! separator and lowercase are tolerated).

use super::{EventHandler, HandlerError, HandlerReport};
use crate::activity_log::{ActivityLog, NewActivityEntry};
use crate::records::{TaskStatus, TaskStore};
use crate::{EventSource, Timestamp};
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Event types this handler acts on
const SUPPORTED_EVENTS: &[&str] = &["pull_request", "push"];

// ============================================================================
// Planning
// ============================================================================

/// Collect normalized task references ("TASK-17") from free text, deduped
/// in order of first appearance
fn collect_references(pattern: &Regex, text: &str, into: &mut Vec<String>) {
    for capture in pattern.captures_iter(text) {
        let reference = format!("TASK-{}", &capture[1]);
        if !into.contains(&reference) {
            into.push(reference);
        }
    }
}

/// Pure mapping from `(event_type, payload)` to the task references whose
/// work has landed
///
/// A pull request only counts when it is closed *and* merged; a close
/// without merge abandons the work. Push events contribute every commit
/// message on the push.
pub(crate) fn plan(
    pattern: &Regex,
    event_type: &str,
    payload: &serde_json::Value,
) -> Result<Vec<String>, HandlerError> {
    let mut references = Vec::new();

    match event_type {
        "pull_request" => {
            let action = payload.get("action").and_then(|a| a.as_str());
            let merged = payload
                .get("pull_request")
                .and_then(|pr| pr.get("merged"))
                .and_then(|m| m.as_bool())
                .unwrap_or(false);
            if action == Some("closed") && merged {
                let title = payload
                    .get("pull_request")
                    .and_then(|pr| pr.get("title"))
                    .and_then(|t| t.as_str())
                    .ok_or_else(|| HandlerError::fatal("pull_request payload has no title"))?;
                collect_references(pattern, title, &mut references);
            }
        }
        "push" => {
            let commits = payload
                .get("commits")
                .and_then(|c| c.as_array())
                .ok_or_else(|| HandlerError::fatal("push payload has no commits array"))?;
            for commit in commits {
                if let Some(message) = commit.get("message").and_then(|m| m.as_str()) {
                    collect_references(pattern, message, &mut references);
                }
            }
        }
        _ => {}
    }

    Ok(references)
}

// ============================================================================
// Handler
// ============================================================================

/// Handler for source-control notifications
pub struct ScmEventHandler {
    tasks: Arc<dyn TaskStore>,
    activity: Arc<dyn ActivityLog>,
    task_ref: Regex,
}

impl ScmEventHandler {
    pub fn new(tasks: Arc<dyn TaskStore>, activity: Arc<dyn ActivityLog>) -> Self {
        Self {
            tasks,
            activity,
            // Matches TASK-17 and task#17; the digits are the capture.
            task_ref: Regex::new(r"(?i)\btask[-#](\d+)\b")
                .expect("task reference pattern is valid"),
        }
    }
}

#[async_trait]
impl EventHandler for ScmEventHandler {
    fn source(&self) -> EventSource {
        EventSource::Scm
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

        let references = plan(&self.task_ref, event_type, &payload)?;
        if references.is_empty() {
            debug!("No task references in event; no-op");
            return Ok(HandlerReport::empty());
        }

        let now = Timestamp::now();
        let mut report = HandlerReport::empty();

        for reference in references {
            let mut task = self
                .tasks
                .get_by_reference(&reference)
                .await?
                .ok_or_else(|| {
                    // The task may exist upstream but not have synced yet.
                    HandlerError::retryable(format!("task '{}' not tracked locally", reference))
                })?;

            if task.status == TaskStatus::Completed {
                // Already done; replay and duplicate references converge
                // without a second ledger entry.
                continue;
            }

            task.status = TaskStatus::Completed;
            task.completed_at = Some(now);
            self.tasks.update(&task).await?;
            self.activity
                .append(NewActivityEntry::system(
                    "task.completed",
                    "task",
                    task.id.to_string(),
                    serde_json::json!({ "reference": reference, "event_type": event_type }),
                ))
                .await?;
            report.push("task", task.id.to_string(), "completed");
        }

        Ok(report)
    }
}

#[cfg(test)]
#[path = "scm_tests.rs"]
mod tests;
