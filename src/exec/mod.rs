// src/exec/mod.rs

//! Execution layer for watch mode.
//!
//! The runtime hands dispatched task names to an [`ExecutorBackend`]. The
//! production backend runs them against the task graph and reports each
//! outcome back as a `RuntimeEvent::TaskCompleted`.

pub mod backend;

pub use backend::{ExecutorBackend, GraphExecutorBackend};
