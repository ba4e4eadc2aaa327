// src/graph/mod.rs

//! Task graph: named leaves (steps, clean steps) composed with `sequence`
//! and `parallel` combinators.
//!
//! - [`node`] holds the tagged node representation and run results.
//! - [`build`] turns a validated config (or a hand-assembled set of jobs)
//!   into a [`TaskGraph`], rejecting unknown references and cycles.
//! - [`execute`] runs a named node to completion.

pub mod build;
pub mod execute;
pub mod node;

pub use build::{BuildContext, TaskGraphBuilder};
pub use node::{Job, JobFuture, RunResult, TaskFailure, TaskNode};

use std::collections::BTreeMap;

use crate::engine::TaskName;

/// Immutable, validated task graph.
#[derive(Debug)]
pub struct TaskGraph {
    nodes: BTreeMap<TaskName, TaskNode>,
}

impl TaskGraph {
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&TaskNode> {
        self.nodes.get(name)
    }

    /// Return all task names, sorted.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }
}
