//! Tests for the source-control handler: reference extraction, merge
//! gating, and idempotent task completion.

use super::*;
use crate::activity_log::ActivityLog;
use crate::adapters::{MemoryActivityLog, MemoryTaskStore};
use crate::records::{ProjectTask, TaskStatus, TaskStore};

// ============================================================================
// Helpers
// ============================================================================

fn handler() -> (ScmEventHandler, Arc<MemoryTaskStore>, Arc<MemoryActivityLog>) {
    let tasks = Arc::new(MemoryTaskStore::new());
    let activity = Arc::new(MemoryActivityLog::new());
    (
        ScmEventHandler::new(tasks.clone(), activity.clone()),
        tasks,
        activity,
    )
}

fn merged_pr_payload(title: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "action": "closed",
        "pull_request": { "title": title, "merged": true }
    }))
    .unwrap()
}

fn push_payload(messages: &[&str]) -> Vec<u8> {
    let commits: Vec<_> = messages
        .iter()
        .map(|m| serde_json::json!({ "message": m }))
        .collect();
    serde_json::to_vec(&serde_json::json!({ "commits": commits })).unwrap()
}

// ============================================================================
// handle tests
// ============================================================================

mod handle_tests {
    use super::*;

    /// A merged PR whose title references a task completes that task.
    #[tokio::test]
    async fn test_merged_pr_completes_referenced_task() {
        let (handler, tasks, activity) = handler();
        tasks
            .insert(ProjectTask::new("TASK-17", "Ship the importer"))
            .await
            .unwrap();

        let payload = merged_pr_payload("Fix importer crash (TASK-17)");
        let report = handler.handle("pull_request", &payload).await.unwrap();

        assert_eq!(report.mutations.len(), 1);
        let task = tasks.get_by_reference("TASK-17").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());

        let entries = activity
            .entries_for("task", &task.id.to_string())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "task.completed");
    }

    /// A closed-but-unmerged PR does not complete anything.
    #[tokio::test]
    async fn test_unmerged_close_is_noop() {
        let (handler, tasks, _) = handler();
        tasks
            .insert(ProjectTask::new("TASK-17", "Ship the importer"))
            .await
            .unwrap();

        let payload = serde_json::to_vec(&serde_json::json!({
            "action": "closed",
            "pull_request": { "title": "Abandon TASK-17", "merged": false }
        }))
        .unwrap();
        let report = handler.handle("pull_request", &payload).await.unwrap();

        assert!(report.mutations.is_empty());
        let task = tasks.get_by_reference("TASK-17").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
    }

    /// Push commit messages complete every referenced task, deduplicated.
    #[tokio::test]
    async fn test_push_completes_tasks_from_commits() {
        let (handler, tasks, _) = handler();
        tasks.insert(ProjectTask::new("TASK-1", "One")).await.unwrap();
        tasks.insert(ProjectTask::new("TASK-2", "Two")).await.unwrap();

        let payload = push_payload(&[
            "task#1 first pass",
            "finish TASK-2",
            "cleanup for task-1",
        ]);
        let report = handler.handle("push", &payload).await.unwrap();

        assert_eq!(report.mutations.len(), 2);
        for reference in ["TASK-1", "TASK-2"] {
            let task = tasks.get_by_reference(reference).await.unwrap().unwrap();
            assert_eq!(task.status, TaskStatus::Completed, "{}", reference);
        }
    }

    /// A reference to a task the platform does not track yet is retryable.
    #[tokio::test]
    async fn test_unknown_reference_is_retryable() {
        let (handler, _, _) = handler();
        let payload = merged_pr_payload("TASK-99 hotfix");
        let err = handler.handle("pull_request", &payload).await.unwrap_err();
        assert!(err.is_retryable());
    }

    /// Completing an already-completed task is a silent no-op with no
    /// second ledger entry.
    #[tokio::test]
    async fn test_recompletion_is_idempotent() {
        let (handler, tasks, activity) = handler();
        tasks
            .insert(ProjectTask::new("TASK-5", "Five"))
            .await
            .unwrap();

        let payload = merged_pr_payload("TASK-5 done");
        handler.handle("pull_request", &payload).await.unwrap();
        let second = handler.handle("pull_request", &payload).await.unwrap();

        assert!(second.mutations.is_empty());
        let task = tasks.get_by_reference("TASK-5").await.unwrap().unwrap();
        let entries = activity
            .entries_for("task", &task.id.to_string())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1, "exactly one completion entry expected");
    }

    /// Commit text without references is a successful no-op.
    #[tokio::test]
    async fn test_no_references_is_noop() {
        let (handler, _, _) = handler();
        let payload = push_payload(&["chore: bump deps", "docs: update readme"]);
        let report = handler.handle("push", &payload).await.unwrap();
        assert!(report.mutations.is_empty());
    }
}
