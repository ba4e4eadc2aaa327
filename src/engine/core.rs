// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - handing dispatched tasks to the executor backend
//! - pushing reload notifications
//!
//! The core has no channels, no Tokio types, and performs no IO.

use crate::engine::event_handlers::{
    handle_reload, handle_task_completion, handle_task_trigger, CoreStep,
};
use crate::engine::guard::RerunGuard;
use crate::engine::{RuntimeEvent, RuntimeOptions};
use crate::types::TriggerWhileRunningBehaviour;

#[derive(Debug)]
pub struct CoreRuntime {
    guard: RerunGuard,
    options: RuntimeOptions,
    completed_runs: usize,
    failed_runs: usize,
}

impl CoreRuntime {
    pub fn new(behaviour: TriggerWhileRunningBehaviour, options: RuntimeOptions) -> Self {
        Self {
            guard: RerunGuard::new(behaviour),
            options,
            completed_runs: 0,
            failed_runs: 0,
        }
    }

    /// True when no task is running or pending.
    pub fn is_idle(&self) -> bool {
        self.guard.is_idle()
    }

    pub fn is_running(&self, task: &str) -> bool {
        self.guard.is_running(task)
    }

    /// Number of watched runs that finished with a failure.
    pub fn failed_runs(&self) -> usize {
        self.failed_runs
    }

    /// Number of watched runs that finished, successfully or not.
    pub fn completed_runs(&self) -> usize {
        self.completed_runs
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskTriggered { task, reason } => {
                handle_task_trigger(&mut self.guard, task, reason)
            }
            RuntimeEvent::ReloadRequested { path } => handle_reload(path),
            RuntimeEvent::TaskCompleted { task, result } => {
                self.completed_runs += 1;
                if !result.is_success() {
                    self.failed_runs += 1;
                }
                handle_task_completion(&mut self.guard, &self.options, task, &result)
            }
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }
}
