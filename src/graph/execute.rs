// src/graph/execute.rs

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::engine::TaskName;
use crate::errors::StepError;
use crate::graph::node::{Job, RunResult, TaskFailure, TaskNode};
use crate::graph::TaskGraph;

/// Boxed future of a task execution; `'static` so it can be spawned.
pub type RunFuture = Pin<Box<dyn Future<Output = RunResult> + Send + 'static>>;

impl TaskGraph {
    /// Execute the named task and everything below it.
    ///
    /// - Leaf: run the job.
    /// - Sequence: run children in declared order, awaiting each; the first
    ///   failure is returned and later children never start.
    /// - Parallel: spawn every child, await all of them, and report every
    ///   failure. Completed siblings keep their side effects.
    ///
    /// Two overlapping executions of the same task are not coordinated here;
    /// the watch runtime guards against that for watch triggers.
    pub fn execute(self: &Arc<Self>, name: &str) -> RunFuture {
        let graph = Arc::clone(self);
        let name = name.to_string();
        Box::pin(async move { graph.execute_node(name).await })
    }

    async fn execute_node(self: Arc<Self>, name: TaskName) -> RunResult {
        let Some(node) = self.nodes.get(&name).cloned() else {
            error!(task = %name, "task is not defined in the graph");
            return RunResult::failed(name.clone(), StepError::UnknownTask(name));
        };

        match node {
            TaskNode::Leaf(job) => run_leaf(name, job).await,
            TaskNode::Sequence(children) => self.run_sequence(name, children).await,
            TaskNode::Parallel(children) => self.run_parallel(name, children).await,
        }
    }

    async fn run_sequence(self: Arc<Self>, name: TaskName, children: Vec<TaskName>) -> RunResult {
        debug!(task = %name, ?children, "running sequence");
        for child in children {
            let result = self.execute(&child).await;
            if !result.is_success() {
                debug!(task = %name, failed_child = %child, "sequence stopped on failure");
                return result;
            }
        }
        RunResult::Completed
    }

    async fn run_parallel(self: Arc<Self>, name: TaskName, children: Vec<TaskName>) -> RunResult {
        debug!(task = %name, ?children, "running parallel");

        let handles: Vec<_> = children
            .iter()
            .map(|child| (child.clone(), tokio::spawn(self.execute(child))))
            .collect();

        // Awaiting in declaration order keeps failure reports stable; the
        // children themselves are already running concurrently.
        let mut failures = Vec::new();
        for (child, handle) in handles {
            match handle.await {
                Ok(result) => failures.extend(result.into_failures()),
                Err(join_err) => {
                    failures.push(TaskFailure {
                        task: child,
                        error: StepError::Aborted(join_err.to_string()),
                    });
                }
            }
        }

        RunResult::from_failures(failures)
    }
}

async fn run_leaf(name: TaskName, job: Arc<dyn Job>) -> RunResult {
    let started = Instant::now();
    info!(task = %name, "starting task");

    let result = job.run().await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(()) => {
            info!(task = %name, elapsed_ms, "task finished");
            RunResult::Completed
        }
        Err(err) => {
            error!(task = %name, elapsed_ms, error = %err, "task failed");
            RunResult::failed(name, err)
        }
    }
}
