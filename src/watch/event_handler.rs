// src/watch/event_handler.rs

//! Event processing logic for file system changes.

use std::collections::BTreeSet;
use std::path::Path;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::{RuntimeEvent, TriggerReason};
use crate::fs::FileSystem;
use crate::watch::hash::ContentCache;
use crate::watch::path_utils::{is_within, relative_str};
use crate::watch::patterns::{matching_rules, WatchAction, WatchRule};

/// Everything the watcher needs to route a changed path.
#[derive(Debug)]
pub struct WatchContext<'a> {
    pub root: &'a Path,
    pub state_dir: &'a str,
    pub rules: &'a [WatchRule],
    pub fs: &'a dyn FileSystem,
}

/// Turn one changed path into runtime events.
///
/// 1. Relativize the path against the root (unrelated paths are ignored).
/// 2. Ignore anything inside the state directory.
/// 3. Collect the actions of every matching rule, consulting `cache` for
///    rules with `use_hash`.
/// 4. Emit one trigger per distinct task (declaration order) and at most one
///    reload request.
pub fn route_change(
    ctx: &WatchContext<'_>,
    path: &Path,
    cache: &mut ContentCache,
) -> Vec<RuntimeEvent> {
    let Some(rel) = relative_str(ctx.root, path) else {
        warn!("could not relativize path {:?} against root {:?}", path, ctx.root);
        return Vec::new();
    };

    if rel.is_empty() || is_within(&rel, ctx.state_dir) {
        return Vec::new();
    }

    let matched = matching_rules(ctx.rules, &rel);
    if matched.is_empty() {
        return Vec::new();
    }

    // Hash at most once per event, and only if some matching rule asks for it.
    let content_changed = if matched.iter().any(|r| r.use_hash()) {
        cache.changed(ctx.fs, path)
    } else {
        true
    };

    let mut events = Vec::new();
    let mut seen_tasks = BTreeSet::new();
    let mut reload = false;

    for rule in matched {
        if rule.use_hash() && !content_changed {
            debug!(rule = %rule.label(), path = %rel, "content unchanged; skipping rule");
            continue;
        }
        match rule.action() {
            WatchAction::RunTask(task) => {
                if seen_tasks.insert(task.clone()) {
                    debug!(task = %task, path = %rel, "watch match -> triggering task");
                    events.push(RuntimeEvent::TaskTriggered {
                        task: task.clone(),
                        reason: TriggerReason::FileWatch,
                    });
                }
            }
            WatchAction::Reload => reload = true,
        }
    }

    if reload {
        debug!(path = %rel, "watch match -> reload");
        events.push(RuntimeEvent::ReloadRequested { path: rel });
    }

    events
}

/// Route a changed path and forward the resulting events to the runtime.
///
/// Returns `false` once the runtime channel is closed, so the watcher loop
/// can stop.
pub async fn process_file_change(
    ctx: &WatchContext<'_>,
    path: &Path,
    cache: &mut ContentCache,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) -> bool {
    for event in route_change(ctx, path, cache) {
        if let Err(err) = runtime_tx.send(event).await {
            warn!("failed to send runtime event: {err}");
            return false;
        }
    }
    true
}
