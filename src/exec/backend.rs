// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of the task graph
//! directly. Tests swap in a fake backend that records dispatched tasks and
//! emits completions on demand.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::engine::{RuntimeEvent, TaskName};
use crate::errors::Result;
use crate::graph::TaskGraph;

/// Trait abstracting how dispatched tasks are executed.
pub trait ExecutorBackend: Send {
    /// Start one execution of `task`.
    ///
    /// Implementations must eventually send a `TaskCompleted` event for the
    /// task, or the runtime will consider it in flight forever.
    fn spawn_task(
        &mut self,
        task: TaskName,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Backend that runs tasks against a built [`TaskGraph`].
///
/// Every dispatch becomes its own Tokio task, so different task names can run
/// concurrently; the runtime guarantees a single execution per name.
#[derive(Debug, Clone)]
pub struct GraphExecutorBackend {
    graph: Arc<TaskGraph>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl GraphExecutorBackend {
    pub fn new(graph: Arc<TaskGraph>, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { graph, runtime_tx }
    }
}

impl ExecutorBackend for GraphExecutorBackend {
    fn spawn_task(
        &mut self,
        task: TaskName,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let graph = Arc::clone(&self.graph);
        let tx = self.runtime_tx.clone();

        Box::pin(async move {
            tokio::spawn(async move {
                let result = graph.execute(&task).await;
                if tx
                    .send(RuntimeEvent::TaskCompleted {
                        task: task.clone(),
                        result,
                    })
                    .await
                    .is_err()
                {
                    warn!(task = %task, "runtime gone before task completion was reported");
                }
            });
            Ok(())
        })
    }
}
