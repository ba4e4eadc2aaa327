// src/graph/build.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::{Combinator, ConfigFile};
use crate::engine::TaskName;
use crate::errors::{AssetdagError, Result};
use crate::fs::FileSystem;
use crate::graph::node::{Job, TaskNode};
use crate::graph::TaskGraph;
use crate::step::{CleanStep, SharedStampStore, Step};

/// Everything a leaf needs besides its own config.
#[derive(Clone)]
pub struct BuildContext {
    /// Project root; relative globs and directories resolve against it.
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub stamps: SharedStampStore,
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`TaskGraph`] and validates it on [`build`](Self::build).
#[derive(Debug, Default)]
pub struct TaskGraphBuilder {
    nodes: BTreeMap<TaskName, TaskNode>,
    duplicates: Vec<TaskName>,
}

impl TaskGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, name: impl Into<TaskName>, node: TaskNode) {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            self.duplicates.push(name.clone());
        }
        self.nodes.insert(name, node);
    }

    pub fn leaf(mut self, name: impl Into<TaskName>, job: Arc<dyn Job>) -> Self {
        self.insert(name, TaskNode::Leaf(job));
        self
    }

    pub fn sequence<S: Into<TaskName>>(
        mut self,
        name: impl Into<TaskName>,
        children: impl IntoIterator<Item = S>,
    ) -> Self {
        let children = children.into_iter().map(Into::into).collect();
        self.insert(name, TaskNode::Sequence(children));
        self
    }

    pub fn parallel<S: Into<TaskName>>(
        mut self,
        name: impl Into<TaskName>,
        children: impl IntoIterator<Item = S>,
    ) -> Self {
        let children = children.into_iter().map(Into::into).collect();
        self.insert(name, TaskNode::Parallel(children));
        self
    }

    /// Validate references and acyclicity, then freeze the graph.
    pub fn build(self) -> Result<TaskGraph> {
        if let Some(name) = self.duplicates.first() {
            return Err(AssetdagError::ConfigError(format!(
                "task '{name}' is defined more than once"
            )));
        }

        for (name, node) in self.nodes.iter() {
            for child in node.children() {
                if child == name {
                    return Err(AssetdagError::DagCycle(format!(
                        "cycle detected in task graph: task '{name}' references itself"
                    )));
                }
                if !self.nodes.contains_key(child) {
                    return Err(AssetdagError::ConfigError(format!(
                        "task '{name}' has unknown child '{child}'"
                    )));
                }
            }
        }

        ensure_acyclic(&self.nodes)?;

        Ok(TaskGraph { nodes: self.nodes })
    }
}

fn ensure_acyclic(nodes: &BTreeMap<TaskName, TaskNode>) -> Result<()> {
    // Edge direction: parent -> child.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for (name, node) in nodes.iter() {
        graph.add_node(name.as_str());
        for child in node.children() {
            graph.add_edge(name.as_str(), child.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(AssetdagError::DagCycle(format!(
            "cycle detected in task graph involving task '{}'",
            cycle.node_id()
        ))),
    }
}

impl TaskGraph {
    /// Bind every configured step, clean step and composite to a graph node.
    pub fn from_config(cfg: &ConfigFile, ctx: &BuildContext) -> Result<Self> {
        let mut builder = TaskGraphBuilder::new();

        for (name, step_cfg) in cfg.steps() {
            let step = Step::from_config(name, step_cfg, cfg, ctx)?;
            builder = builder.leaf(name.clone(), Arc::new(step));
        }

        for (name, clean_cfg) in cfg.cleans() {
            let clean = CleanStep::from_config(name, clean_cfg, cfg, ctx)?;
            builder = builder.leaf(name.clone(), Arc::new(clean));
        }

        for (name, task) in cfg.tasks() {
            builder = match task.combinator() {
                Some((Combinator::Sequence, children)) => {
                    builder.sequence(name.clone(), children.iter().cloned())
                }
                Some((Combinator::Parallel, children)) => {
                    builder.parallel(name.clone(), children.iter().cloned())
                }
                None => {
                    return Err(AssetdagError::ConfigError(format!(
                        "task '{name}' must set exactly one of `sequence` or `parallel`"
                    )));
                }
            };
        }

        builder.build()
    }
}
