// src/engine/mod.rs

//! Watch-mode orchestration engine.
//!
//! This module ties together:
//! - the per-task re-run guard (what happens when a trigger arrives while
//!   that task is still running)
//! - the main runtime event loop that reacts to:
//!   - file-watch triggers
//!   - reload requests
//!   - task completion events
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::graph::RunResult;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Why a task was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Manual trigger (e.g. from a test or the CLI).
    Manual,
    /// Triggered due to a filesystem event.
    FileWatch,
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// If true, exit the runtime once no task is running or pending.
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime from watchers, executors, etc.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A task should be (re-)run.
    TaskTriggered {
        task: TaskName,
        reason: TriggerReason,
    },
    /// Connected clients should reload.
    ReloadRequested {
        path: String,
    },
    /// A task execution finished.
    TaskCompleted {
        task: TaskName,
        result: RunResult,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod guard;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use guard::{RerunGuard, TriggerDecision};
pub use crate::types::TriggerWhileRunningBehaviour;
pub use runtime::Runtime;
