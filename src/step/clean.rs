// src/step/clean.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{CleanConfig, ConfigFile};
use crate::engine::TaskName;
use crate::errors::{AssetdagError, Result, StepError};
use crate::fs::FileSystem;
use crate::graph::{BuildContext, Job, JobFuture};
use crate::step::stamp::SharedStampStore;

/// Empties a set of directories.
///
/// The directories themselves are kept. Paths outside the project root are
/// allowed. A directory that does not exist counts as already clean.
///
/// Steps writing below a cleaned directory lose their only-changed stamp, so
/// their next run rebuilds everything the clean removed.
pub struct CleanStep {
    name: TaskName,
    dirs: Vec<PathBuf>,
    fs: Arc<dyn FileSystem>,
    stale_steps: Vec<TaskName>,
    stamps: Option<SharedStampStore>,
}

impl std::fmt::Debug for CleanStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanStep")
            .field("name", &self.name)
            .field("dirs", &self.dirs)
            .field("stale_steps", &self.stale_steps)
            .finish_non_exhaustive()
    }
}

impl CleanStep {
    pub fn new(name: impl Into<TaskName>, dirs: Vec<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            name: name.into(),
            dirs,
            fs,
            stale_steps: Vec::new(),
            stamps: None,
        }
    }

    /// Forget the stamps of `steps` in `stamps` whenever this clean runs.
    pub fn invalidates(mut self, steps: Vec<TaskName>, stamps: SharedStampStore) -> Self {
        self.stale_steps = steps;
        self.stamps = Some(stamps);
        self
    }

    pub fn from_config(
        name: &str,
        clean: &CleanConfig,
        cfg: &ConfigFile,
        ctx: &BuildContext,
    ) -> Result<Self> {
        let mut dirs = Vec::new();

        for asset in clean.assets.iter() {
            let dir = cfg
                .paths()
                .get(asset)
                .and_then(|p| p.dir(clean.location))
                .ok_or_else(|| {
                    AssetdagError::ConfigError(format!(
                        "clean '{name}' needs [paths.{asset}].{}",
                        clean.location.as_str()
                    ))
                })?;
            dirs.push(ctx.root.join(dir));
        }
        // `join` keeps absolute extra dirs as they are.
        dirs.extend(clean.dirs.iter().map(|d| ctx.root.join(d.trim())));

        let stale_steps = cfg
            .steps()
            .iter()
            .filter(|(_, step)| step.since_last_run)
            .filter_map(|(step_name, step)| {
                let out = cfg.paths().get(&step.asset)?.dir(step.output)?;
                let out = ctx.root.join(out);
                dirs.iter()
                    .any(|dir| out.starts_with(dir))
                    .then(|| step_name.clone())
            })
            .collect();

        Ok(Self::new(name, dirs, Arc::clone(&ctx.fs))
            .invalidates(stale_steps, Arc::clone(&ctx.stamps)))
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Steps whose stamps this clean drops.
    pub fn stale_steps(&self) -> &[TaskName] {
        &self.stale_steps
    }

    /// Delete every entry below each directory.
    pub fn run_blocking(&self) -> std::result::Result<usize, StepError> {
        self.forget_stamps();

        let mut removed = 0;
        for dir in self.dirs.iter() {
            removed += self.clean_dir(dir)?;
        }
        Ok(removed)
    }

    fn clean_dir(&self, dir: &Path) -> std::result::Result<usize, StepError> {
        let fs = self.fs.as_ref();
        if !fs.exists(dir) {
            debug!(clean = %self.name, ?dir, "directory does not exist; nothing to clean");
            return Ok(0);
        }
        if !fs.is_dir(dir) {
            return Err(StepError::filesystem(dir, "not a directory"));
        }

        let entries = fs
            .read_dir(dir)
            .map_err(|e| StepError::filesystem(dir, format!("{e:#}")))?;
        let count = entries.len();
        for entry in entries {
            fs.remove(&entry)
                .map_err(|e| StepError::filesystem(&entry, format!("{e:#}")))?;
        }
        debug!(clean = %self.name, ?dir, removed = count, "directory cleaned");
        Ok(count)
    }

    // Runs before deleting anything: a clean that fails halfway still leaves
    // the affected steps rebuilding from scratch.
    fn forget_stamps(&self) {
        let Some(stamps) = &self.stamps else {
            return;
        };
        if self.stale_steps.is_empty() {
            return;
        }
        let mut store = match stamps.lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!(clean = %self.name, "stamp store mutex poisoned; stamps kept");
                return;
            }
        };
        let steps: Vec<&str> = self.stale_steps.iter().map(String::as_str).collect();
        match store.forget(&steps) {
            Ok(()) => debug!(clean = %self.name, ?steps, "dropped stamps of cleaned steps"),
            Err(err) => warn!(clean = %self.name, error = %err, "failed to drop step stamps"),
        }
    }
}

impl Job for CleanStep {
    fn run(self: Arc<Self>) -> JobFuture {
        Box::pin(async move {
            let name = self.name.clone();
            let removed = tokio::task::spawn_blocking(move || self.run_blocking())
                .await
                .map_err(|e| StepError::Aborted(e.to_string()))??;
            info!(clean = %name, removed, "clean completed");
            Ok::<(), StepError>(())
        })
    }
}
