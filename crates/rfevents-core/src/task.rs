// ── Task progress reporting ──
//
// Long-running subscription operations report progress to an external task
// service. Only the reporting contract lives here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum TaskState {
    New,
    Running,
    Completed,
    Exception,
}

/// One progress report for a task or sub-task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskUpdate {
    pub task_id: String,
    pub state: TaskState,
    pub percent_complete: i32,
    pub status_code: u16,
    pub message: Option<String>,
    pub response: Option<Value>,
    pub updated_at: DateTime<Utc>,
}

impl TaskUpdate {
    pub fn running(task_id: &str, percent_complete: i32) -> Self {
        Self {
            task_id: task_id.to_owned(),
            state: TaskState::Running,
            percent_complete,
            status_code: 202,
            message: None,
            response: None,
            updated_at: Utc::now(),
        }
    }

    pub fn finished(task_id: &str, status_code: u16, response: Value) -> Self {
        Self {
            task_id: task_id.to_owned(),
            state: if status_code == 201 || status_code == 200 {
                TaskState::Completed
            } else {
                TaskState::Exception
            },
            percent_complete: 100,
            status_code,
            message: None,
            response: Some(response),
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[async_trait]
pub trait TaskReporter: Send + Sync {
    async fn update(&self, update: TaskUpdate);

    /// Create a sub-task under `parent` and return its ID.
    async fn create_child(&self, parent: &str) -> String;
}

/// Discards every report.
#[derive(Debug, Default)]
pub struct NoopTaskReporter;

#[async_trait]
impl TaskReporter for NoopTaskReporter {
    async fn update(&self, _update: TaskUpdate) {}

    async fn create_child(&self, parent: &str) -> String {
        format!("{parent}.sub")
    }
}

/// Keeps every report in memory. Used by the CLI and tests.
#[derive(Debug, Default)]
pub struct MemoryTaskReporter {
    updates: Mutex<Vec<TaskUpdate>>,
    children: Mutex<u32>,
}

impl MemoryTaskReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn updates(&self) -> Vec<TaskUpdate> {
        self.updates.lock().await.clone()
    }

    /// Latest report for `task_id`.
    pub async fn last(&self, task_id: &str) -> Option<TaskUpdate> {
        self.updates
            .lock()
            .await
            .iter()
            .rev()
            .find(|u| u.task_id == task_id)
            .cloned()
    }
}

#[async_trait]
impl TaskReporter for MemoryTaskReporter {
    async fn update(&self, update: TaskUpdate) {
        self.updates.lock().await.push(update);
    }

    async fn create_child(&self, parent: &str) -> String {
        let mut next = self.children.lock().await;
        *next += 1;
        format!("{parent}.{next}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_reporter_numbers_children_and_keeps_order() {
        let reporter = MemoryTaskReporter::new();
        assert_eq!(reporter.create_child("task1").await, "task1.1");
        assert_eq!(reporter.create_child("task1").await, "task1.2");

        reporter.update(TaskUpdate::running("task1", 49)).await;
        reporter
            .update(TaskUpdate::finished("task1", 400, Value::Null).with_message("failed"))
            .await;

        let last = reporter.last("task1").await.unwrap();
        assert_eq!(last.state, TaskState::Exception);
        assert_eq!(last.message.as_deref(), Some("failed"));
        assert_eq!(reporter.updates().await.len(), 2);
    }
}
