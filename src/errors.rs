// src/errors.rs

//! Crate-wide error types.
//!
//! [`AssetdagError`] covers everything that aborts before or outside a task
//! run (configuration, IO at the edges). [`StepError`] is what a single step
//! run fails with; it is carried inside a [`RunResult`](crate::graph::RunResult)
//! instead of being propagated with `?`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Why a single step run failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// A transform rejected its input (e.g. a stylesheet syntax error).
    #[error("transform '{transform}' failed: {message}")]
    Transform { transform: String, message: String },

    /// Reading, writing or deleting files failed.
    #[error("filesystem error at {path:?}: {message}")]
    Filesystem { path: PathBuf, message: String },

    /// A step that requires input found nothing to process.
    #[error("missing source: no files match {patterns:?}")]
    MissingSource { patterns: Vec<String> },

    /// A composite referenced a task the graph does not define.
    #[error("task '{0}' is not defined")]
    UnknownTask(String),

    /// The task's future panicked or was cancelled before reporting.
    #[error("task aborted: {0}")]
    Aborted(String),
}

impl StepError {
    pub fn filesystem(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        StepError::Filesystem {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AssetdagError>;
