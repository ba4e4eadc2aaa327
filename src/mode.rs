// src/mode.rs

//! Top-level entry: run a mode's task once, then optionally keep watching.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::{ConfigFile, ModeConfig};
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use crate::errors::{AssetdagError, Result};
use crate::exec::GraphExecutorBackend;
use crate::fs::{FileSystem, RealFileSystem};
use crate::graph::{BuildContext, RunResult, TaskGraph};
use crate::reload::{self, LiveReloadServer, NoopNotifier, ReloadNotifier};
use crate::step::{open_stamp_store, state_dir};
use crate::types::Mode;
use crate::watch::{build_watch_rules, spawn_watcher};

/// Runs named tasks and modes against one validated configuration.
///
/// The task graph is resolved once at construction; every run after that
/// reuses the same leaves and stamp store.
#[derive(Debug)]
pub struct ModeRunner {
    config: ConfigFile,
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    graph: Arc<TaskGraph>,
}

impl ModeRunner {
    pub fn new(config: ConfigFile, root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_fs(config, root, Arc::new(RealFileSystem))
    }

    pub fn with_fs(
        config: ConfigFile,
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let root = root.into();
        let section = config.config_section();

        let stamps = open_stamp_store(
            section.stamp_storage,
            state_dir(&root, &section.state_dir),
            Arc::clone(&fs),
        );
        // Forget stamps of steps that no longer exist.
        let active: Vec<&str> = config.steps().keys().map(String::as_str).collect();
        match stamps.lock() {
            Ok(mut store) => {
                if let Err(err) = store.prune(&active) {
                    warn!(error = %err, "failed to prune stale step stamps");
                }
            }
            Err(_) => warn!("stamp store lock poisoned; skipping prune"),
        }

        let ctx = BuildContext {
            root: root.clone(),
            fs: Arc::clone(&fs),
            stamps,
        };
        let graph = Arc::new(TaskGraph::from_config(&config, &ctx)?);

        Ok(Self {
            config,
            root,
            fs,
            graph,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn graph(&self) -> &Arc<TaskGraph> {
        &self.graph
    }

    /// Execute one named task to completion.
    ///
    /// Unknown names are an error, not a failed run.
    pub async fn run_task(&self, name: &str) -> Result<RunResult> {
        if !self.graph.contains(name) {
            return Err(AssetdagError::TaskNotFound(name.to_string()));
        }

        info!(task = %name, "running task");
        let started = Instant::now();
        let result = self.graph.execute(name).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            RunResult::Completed => info!(task = %name, elapsed_ms, "task finished"),
            RunResult::Failed(failures) => {
                for failure in failures {
                    error!(task = %name, failed = %failure.task, error = %failure.error, "step failed");
                }
                error!(task = %name, elapsed_ms, failures = failures.len(), "task failed");
            }
        }

        Ok(result)
    }

    /// Run `mode`'s top-level task; keep watching when the mode (or
    /// `watch_override`) asks for it.
    ///
    /// One-shot runs return the build result. Watch sessions report a failed
    /// initial build, keep going, and return `Completed` once shut down.
    pub async fn run_mode(&self, mode: Mode, watch_override: bool) -> Result<RunResult> {
        let mode_cfg = self
            .config
            .mode(mode)
            .ok_or_else(|| AssetdagError::ConfigError(format!("[mode.{mode}] is not configured")))?;

        info!(%mode, task = %mode_cfg.task, "starting mode");
        let result = self.run_task(&mode_cfg.task).await?;

        if !(mode_cfg.watch || watch_override) {
            return Ok(result);
        }

        if !result.is_success() {
            warn!(%mode, "initial build failed; watching anyway");
        }
        self.watch(mode, mode_cfg).await?;
        Ok(RunResult::Completed)
    }

    async fn watch(&self, mode: Mode, mode_cfg: &ModeConfig) -> Result<()> {
        let rules = build_watch_rules(&mode_cfg.watch_rules, self.config.paths())?;
        if rules.is_empty() {
            warn!(%mode, "watch enabled but no watch rules are configured");
        }

        let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
        let executor = GraphExecutorBackend::new(Arc::clone(&self.graph), rt_tx.clone());

        let _watcher = spawn_watcher(
            self.root.clone(),
            self.config.config_section().state_dir.clone(),
            rules,
            Arc::clone(&self.fs),
            rt_tx.clone(),
        )?;

        // Ctrl-C -> graceful shutdown.
        {
            let tx = rt_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    eprintln!("failed to listen for Ctrl+C: {e}");
                    return;
                }
                let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
            });
        }

        let core = CoreRuntime::new(
            self.config.config_section().triggered_while_running_behaviour,
            RuntimeOptions::default(),
        );

        if mode_cfg.serve {
            let server = self.config.server();
            let notifier = LiveReloadServer::bind(&server.host, server.reload_port)?;
            info!(port = notifier.port(), "live-reload socket listening");

            let host = server.host.clone();
            let port = server.port;
            let reload_port = notifier.port();
            let site_root = self.root.join(&server.root);
            tokio::spawn(async move {
                if let Err(err) = reload::serve(&host, port, site_root, reload_port).await {
                    error!(error = %err, "static server stopped");
                }
            });

            drive(Runtime::new(core, rt_rx, executor, notifier)).await
        } else {
            drive(Runtime::new(core, rt_rx, executor, NoopNotifier)).await
        }
    }
}

async fn drive<N: ReloadNotifier>(runtime: Runtime<GraphExecutorBackend, N>) -> Result<()> {
    let core = runtime.run().await?;
    info!(
        runs = core.completed_runs(),
        failed = core.failed_runs(),
        "watch session ended"
    );
    Ok(())
}
