// src/step/executor.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::config::{ConfigFile, StepConfig};
use crate::engine::TaskName;
use crate::errors::{AssetdagError, Result, StepError};
use crate::fs::FileSystem;
use crate::graph::{BuildContext, Job, JobFuture};
use crate::step::sources::SourceSet;
use crate::step::stamp::SharedStampStore;
use crate::step::transform::{build_transform, FileEntry, FileSet, Transform};
use crate::types::AssetLocation;

/// What a successful step run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepReport {
    /// Files matched by the source globs.
    pub matched: usize,
    /// Files handed to the first transform (after the only-changed filter).
    pub processed: usize,
    /// Files written to the destination.
    pub written: usize,
}

/// A read -> transform -> write unit bound to a destination directory.
pub struct Step {
    name: TaskName,
    sources: SourceSet,
    transforms: Vec<Arc<dyn Transform>>,
    dest: PathBuf,
    since_last_run: bool,
    require_input: bool,
    enabled: bool,
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    stamps: SharedStampStore,
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("sources", &self.sources.patterns())
            .field("transforms", &self.transforms)
            .field("dest", &self.dest)
            .finish_non_exhaustive()
    }
}

impl Step {
    pub fn new(
        name: impl Into<TaskName>,
        sources: SourceSet,
        transforms: Vec<Arc<dyn Transform>>,
        dest: impl Into<PathBuf>,
        ctx: &BuildContext,
    ) -> Self {
        Self {
            name: name.into(),
            sources,
            transforms,
            dest: dest.into(),
            since_last_run: false,
            require_input: false,
            enabled: true,
            root: ctx.root.clone(),
            fs: Arc::clone(&ctx.fs),
            stamps: Arc::clone(&ctx.stamps),
        }
    }

    pub fn since_last_run(mut self, on: bool) -> Self {
        self.since_last_run = on;
        self
    }

    pub fn require_input(mut self, on: bool) -> Self {
        self.require_input = on;
        self
    }

    pub fn enabled(mut self, on: bool) -> Self {
        self.enabled = on;
        self
    }

    /// Bind a `[step.<name>]` section to the project root and asset paths.
    pub fn from_config(
        name: &str,
        step: &StepConfig,
        cfg: &ConfigFile,
        ctx: &BuildContext,
    ) -> Result<Self> {
        let paths = cfg.paths().get(&step.asset).ok_or_else(|| {
            AssetdagError::ConfigError(format!(
                "step '{name}' references unknown asset class '{}'",
                step.asset
            ))
        })?;

        let patterns = match step.input {
            AssetLocation::Src => paths.src.clone(),
            location => match paths.dir(location) {
                Some(dir) => vec![format!("{}/**/*", dir.trim_end_matches('/'))],
                None => Vec::new(),
            },
        };
        let sources = SourceSet::new(&patterns).map_err(|e| {
            AssetdagError::ConfigError(format!("step '{name}': {e:#}"))
        })?;

        let include_paths: Vec<PathBuf> = paths
            .include_paths
            .iter()
            .map(|p| ctx.root.join(p))
            .collect();
        let transforms = step
            .transforms
            .iter()
            .map(|spec| build_transform(spec, &include_paths))
            .collect();

        // Disabled steps may leave their directories undefined.
        let dest = paths
            .dir(step.output)
            .map(|d| ctx.root.join(d))
            .unwrap_or_else(|| ctx.root.clone());

        Ok(Step::new(name, sources, transforms, dest, ctx)
            .since_last_run(step.since_last_run)
            .require_input(step.require_input)
            .enabled(step.enabled))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Run the step synchronously.
    ///
    /// Nothing is written unless every transform succeeds. The stamp used by
    /// the only-changed filter is the run's start time and is only recorded
    /// after a successful write.
    pub fn run_blocking(&self) -> std::result::Result<StepReport, StepError> {
        if !self.enabled {
            info!(step = %self.name, "step disabled; skipping");
            return Ok(StepReport::default());
        }

        let started_at = SystemTime::now();
        let fs = self.fs.as_ref();

        let matched = self
            .sources
            .collect(fs, &self.root)
            .map_err(|e| StepError::filesystem(&self.root, format!("{e:#}")))?;

        if matched.is_empty() && self.require_input {
            return Err(StepError::MissingSource {
                patterns: self.sources.patterns().to_vec(),
            });
        }

        let since = if self.since_last_run && self.dest_has_output() {
            self.load_stamp()
        } else {
            None
        };

        let mut files: FileSet = Vec::with_capacity(matched.len());
        for source in matched.iter() {
            if let Some(since) = since {
                let modified = fs
                    .modified(&source.abs)
                    .map_err(|e| StepError::filesystem(&source.abs, format!("{e:#}")))?;
                if modified <= since {
                    continue;
                }
            }
            let contents = fs
                .read(&source.abs)
                .map_err(|e| StepError::filesystem(&source.abs, format!("{e:#}")))?;
            files.push(FileEntry {
                path: source.rel.clone(),
                contents,
                origin: Some(source.abs.clone()),
            });
        }

        let processed = files.len();
        debug!(
            step = %self.name,
            matched = matched.len(),
            processed,
            "step inputs collected"
        );

        for transform in &self.transforms {
            files = transform.apply(files).map_err(|e| StepError::Transform {
                transform: e.transform,
                message: e.message,
            })?;
        }

        for file in files.iter() {
            let target = self.dest.join(&file.path);
            fs.write(&target, &file.contents)
                .map_err(|e| StepError::filesystem(&target, format!("{e:#}")))?;
        }

        if self.since_last_run {
            self.save_stamp(started_at);
        }

        Ok(StepReport {
            matched: matched.len(),
            processed,
            written: files.len(),
        })
    }

    /// An empty or missing destination means earlier output is gone, so the
    /// stamp no longer describes what is on disk.
    fn dest_has_output(&self) -> bool {
        let fs = self.fs.as_ref();
        let has_output = fs.is_dir(&self.dest)
            && fs
                .read_dir(&self.dest)
                .map(|entries| !entries.is_empty())
                .unwrap_or(false);
        if !has_output {
            debug!(step = %self.name, dest = ?self.dest, "destination empty; ignoring stamp");
        }
        has_output
    }

    fn load_stamp(&self) -> Option<SystemTime> {
        let store = match self.stamps.lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!(step = %self.name, "stamp store mutex poisoned; processing all files");
                return None;
            }
        };
        match store.load(&self.name) {
            Ok(stamp) => stamp,
            Err(err) => {
                warn!(step = %self.name, error = %err, "failed to load step stamp; processing all files");
                None
            }
        }
    }

    fn save_stamp(&self, at: SystemTime) {
        let mut store = match self.stamps.lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!(step = %self.name, "stamp store mutex poisoned; stamp not saved");
                return;
            }
        };
        if let Err(err) = store.save(&self.name, at) {
            warn!(step = %self.name, error = %err, "failed to save step stamp");
        }
    }
}

impl Job for Step {
    fn run(self: Arc<Self>) -> JobFuture {
        Box::pin(async move {
            let name = self.name.clone();
            let report = tokio::task::spawn_blocking(move || self.run_blocking())
                .await
                .map_err(|e| StepError::Aborted(e.to_string()))??;

            info!(
                step = %name,
                matched = report.matched,
                processed = report.processed,
                written = report.written,
                "step completed"
            );
            Ok::<(), StepError>(())
        })
    }
}
