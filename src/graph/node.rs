// src/graph/node.rs

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::engine::TaskName;
use crate::errors::StepError;

/// Future returned by a leaf job.
pub type JobFuture =
    Pin<Box<dyn Future<Output = std::result::Result<(), StepError>> + Send + 'static>>;

/// A leaf unit of work: a step, a clean step, or a test double.
///
/// `run` must not block the calling thread; blocking work belongs on
/// `tokio::task::spawn_blocking`.
pub trait Job: Send + Sync + fmt::Debug {
    fn run(self: Arc<Self>) -> JobFuture;
}

/// A task graph node.
#[derive(Debug, Clone)]
pub enum TaskNode {
    Leaf(Arc<dyn Job>),
    /// Children run strictly in order; the first failure stops the rest.
    Sequence(Vec<TaskName>),
    /// Children run concurrently; every child is awaited.
    Parallel(Vec<TaskName>),
}

impl TaskNode {
    pub fn children(&self) -> &[TaskName] {
        match self {
            TaskNode::Leaf(_) => &[],
            TaskNode::Sequence(children) | TaskNode::Parallel(children) => children,
        }
    }
}

/// One failed leaf inside a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: TaskName,
    pub error: StepError,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.task, self.error)
    }
}

/// Outcome of executing a task.
///
/// Composite nodes aggregate their children: a sequence carries the failure
/// that stopped it, a parallel node carries every failed child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    Completed,
    Failed(Vec<TaskFailure>),
}

impl RunResult {
    pub fn failed(task: impl Into<TaskName>, error: StepError) -> Self {
        RunResult::Failed(vec![TaskFailure {
            task: task.into(),
            error,
        }])
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunResult::Completed)
    }

    pub fn failures(&self) -> &[TaskFailure] {
        match self {
            RunResult::Completed => &[],
            RunResult::Failed(failures) => failures,
        }
    }

    pub fn into_failures(self) -> Vec<TaskFailure> {
        match self {
            RunResult::Completed => Vec::new(),
            RunResult::Failed(failures) => failures,
        }
    }

    /// Collapse many child results into one.
    pub fn from_failures(failures: Vec<TaskFailure>) -> Self {
        if failures.is_empty() {
            RunResult::Completed
        } else {
            RunResult::Failed(failures)
        }
    }
}
