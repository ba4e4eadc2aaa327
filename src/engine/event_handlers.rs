// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{debug, error, info};

use crate::engine::guard::{RerunGuard, TriggerDecision};
use crate::engine::{RuntimeOptions, TaskName, TriggerReason};
use crate::graph::RunResult;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Start an execution of this task.
    DispatchTask(TaskName),
    /// Push a reload signal for this changed path.
    NotifyReload(String),
    /// Request that the process exits (used when idle with `exit_when_idle`).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Handle a task trigger event.
pub fn handle_task_trigger(
    guard: &mut RerunGuard,
    task: TaskName,
    reason: TriggerReason,
) -> CoreStep {
    match guard.on_trigger(&task) {
        TriggerDecision::Dispatch => {
            debug!(task = %task, ?reason, "dispatching task");
            CoreStep::running(vec![CoreCommand::DispatchTask(task)])
        }
        TriggerDecision::Queued => {
            info!(task = %task, "task is running; re-run queued");
            CoreStep::running(Vec::new())
        }
        TriggerDecision::Coalesced | TriggerDecision::Dropped => CoreStep::running(Vec::new()),
    }
}

/// Handle a reload request; no task is involved.
pub fn handle_reload(path: String) -> CoreStep {
    CoreStep::running(vec![CoreCommand::NotifyReload(path)])
}

/// Handle a task completion event.
///
/// Failures are reported and otherwise ignored; the loop keeps running.
pub fn handle_task_completion(
    guard: &mut RerunGuard,
    options: &RuntimeOptions,
    task: TaskName,
    result: &RunResult,
) -> CoreStep {
    let mut commands = Vec::new();

    match result {
        RunResult::Completed => info!(task = %task, "watched task completed"),
        RunResult::Failed(failures) => {
            for failure in failures {
                error!(task = %task, failed = %failure.task, error = %failure.error, "watched task failed");
            }
        }
    }

    if guard.on_completion(&task) {
        debug!(task = %task, "starting pending re-run");
        commands.push(CoreCommand::DispatchTask(task));
    }

    let mut keep_running = true;
    if options.exit_when_idle && guard.is_idle() {
        keep_running = false;
        commands.push(CoreCommand::RequestExit);
    }

    CoreStep {
        commands,
        keep_running,
    }
}
