use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Unique task identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        TaskId(id.into())
    }

    /// Fresh 8-character token
    pub fn generate() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        TaskId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        TaskId(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        TaskId(id)
    }
}

/// The work a task performs against an execution context
///
/// `C` is the opaque browsing session supplied by the environment. A handler
/// reports proxy-layer problems as `PoolError::ProxyConnectivityFailure` and
/// everything else as `PoolError::HandlerFailure`.
#[async_trait]
pub trait Handler<C>: Send + Sync {
    async fn handle(&self, context: &mut C, args: &[Value]) -> Result<Value>;
}

/// Immutable unit of work
pub struct Task<C> {
    id: TaskId,
    handler: Arc<dyn Handler<C>>,
    args: Vec<Value>,
}

impl<C> Task<C> {
    pub fn new(id: impl Into<TaskId>, handler: Arc<dyn Handler<C>>, args: Vec<Value>) -> Self {
        Task {
            id: id.into(),
            handler,
            args,
        }
    }

    /// Task with a generated id
    pub fn anonymous(handler: Arc<dyn Handler<C>>, args: Vec<Value>) -> Self {
        Task::new(TaskId::generate(), handler, args)
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub(crate) async fn run(&self, context: &mut C) -> Result<Value> {
        self.handler.handle(context, &self.args).await
    }
}

impl<C> Clone for Task<C> {
    fn clone(&self) -> Self {
        Task {
            id: self.id.clone(),
            handler: Arc::clone(&self.handler),
            args: self.args.clone(),
        }
    }
}

impl<C> fmt::Debug for Task<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of a task inside the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Retrying,
    Succeeded,
    PermanentlyFailed,
    /// Abandoned by `stop()` while running
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::PermanentlyFailed | TaskState::Cancelled
        )
    }
}

/// Successful handler result
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutput {
    pub task_id: TaskId,
    pub value: Value,
    pub attempts: u32,
}

/// Task that exhausted its retry budget
pub struct FailedTask<C> {
    pub task: Task<C>,
    pub error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

impl<C> Clone for FailedTask<C> {
    fn clone(&self) -> Self {
        FailedTask {
            task: self.task.clone(),
            error: self.error.clone(),
            attempts: self.attempts,
            failed_at: self.failed_at,
        }
    }
}

impl<C> fmt::Debug for FailedTask<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailedTask")
            .field("task", &self.task)
            .field("error", &self.error)
            .field("attempts", &self.attempts)
            .field("failed_at", &self.failed_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Handler<()> for Echo {
        async fn handle(&self, _context: &mut (), args: &[Value]) -> Result<Value> {
            Ok(Value::Array(args.to_vec()))
        }
    }

    #[test]
    fn test_generated_ids_are_short_and_unique() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_eq!(a.as_str().len(), 8);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_task_runs_handler_with_args() {
        let task: Task<()> = Task::new(
            "crawl-1",
            Arc::new(Echo),
            vec![json!("https://example.com"), json!(2)],
        );
        assert_eq!(task.id().as_str(), "crawl-1");

        let value = task.run(&mut ()).await.unwrap();
        assert_eq!(value, json!(["https://example.com", 2]));
    }

    #[test]
    fn test_clone_shares_handler() {
        let task: Task<()> = Task::anonymous(Arc::new(Echo), vec![json!(1)]);
        let copy = task.clone();
        assert_eq!(task.id(), copy.id());
        assert_eq!(copy.args(), &[json!(1)]);
        assert!(Arc::ptr_eq(&task.handler, &copy.handler));
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Succeeded.is_terminal());
        assert!(TaskState::PermanentlyFailed.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Retrying.is_terminal());
    }
}
