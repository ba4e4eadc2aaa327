// src/watch/watcher.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::RuntimeEvent;
use crate::fs::FileSystem;
use crate::watch::event_handler::{process_file_change, WatchContext};
use crate::watch::hash::ContentCache;
use crate::watch::patterns::WatchRule;

/// Handle for the filesystem watcher.
///
/// Dropping this handle stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Spawn a filesystem watcher that observes `root` recursively and forwards
/// `TaskTriggered` / `ReloadRequested` events for paths matching `rules`.
///
/// Paths below `state_dir` (relative to `root`) never fire.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    state_dir: String,
    rules: Vec<WatchRule>,
    fs: Arc<dyn FileSystem>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("assetdag: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("assetdag: file watch error: {err}");
            }
        },
        Config::default(),
    )
    .context("creating filesystem watcher")?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watching {:?}", root))?;

    info!(root = ?root, rules = rules.len(), "file watcher started");

    tokio::spawn(async move {
        let mut cache = ContentCache::new();
        let ctx = WatchContext {
            root: &root,
            state_dir: &state_dir,
            rules: &rules,
            fs: fs.as_ref(),
        };

        while let Some(event) = event_rx.recv().await {
            if !is_content_event(&event.kind) {
                continue;
            }
            debug!(?event, "received notify event");

            for path in &event.paths {
                if !process_file_change(&ctx, path, &mut cache, &runtime_tx).await {
                    debug!("runtime channel closed; stopping watcher loop");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

/// Creations, content/name modifications and removals. Access and metadata
/// events are dropped so reading sources during a build cannot retrigger it.
fn is_content_event(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}
