// src/watch/patterns.rs

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result};
use globset::{GlobSet, GlobSetBuilder};

use crate::config::{AssetPaths, WatchRuleConfig};
use crate::engine::TaskName;
use crate::step::sources::{compile_glob, normalize_pattern};

/// What a matching change should cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchAction {
    /// Re-run the named task.
    RunTask(TaskName),
    /// Push a reload signal to connected clients; nothing is rebuilt.
    Reload,
}

/// A compiled `[[mode.<m>.watch_rules]]` entry.
///
/// Patterns are matched against paths relative to the project root, e.g.
/// `"src/scss/main.scss"`. Patterns starting with `!` exclude.
#[derive(Clone)]
pub struct WatchRule {
    label: String,
    include_set: GlobSet,
    exclude_set: Option<GlobSet>,
    action: WatchAction,
    use_hash: bool,
}

impl fmt::Debug for WatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRule")
            .field("label", &self.label)
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

impl WatchRule {
    pub fn new<S: AsRef<str>>(
        label: impl Into<String>,
        patterns: &[S],
        action: WatchAction,
        use_hash: bool,
    ) -> Result<Self> {
        let label = label.into();
        let mut includes = Vec::new();
        let mut excludes = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            match pattern.strip_prefix('!') {
                Some(negated) => excludes.push(normalize_pattern(negated)),
                None => includes.push(normalize_pattern(pattern)),
            }
        }
        if includes.is_empty() {
            anyhow::bail!("watch rule '{label}' has no include patterns");
        }

        let include_set = build_globset(&includes)
            .with_context(|| format!("building watch globset for rule '{label}'"))?;
        let exclude_set = if excludes.is_empty() {
            None
        } else {
            Some(
                build_globset(&excludes)
                    .with_context(|| format!("building exclude globset for rule '{label}'"))?,
            )
        };

        Ok(Self {
            label,
            include_set,
            exclude_set,
            action,
            use_hash,
        })
    }

    /// The configured pattern, or `asset:<name>` for asset-backed rules.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn action(&self) -> &WatchAction {
        &self.action
    }

    /// Whether this rule only fires when file content actually changed.
    pub fn use_hash(&self) -> bool {
        self.use_hash
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(compile_glob(pat)?);
    }
    Ok(builder.build()?)
}

/// Compile the watch rules declared for a mode.
///
/// A rule with `reload = true` becomes [`WatchAction::Reload`]; otherwise its
/// `task` is required. A rule naming an `asset` watches that asset class's
/// `watch` globs (or its `src` globs when `watch` is unset).
pub fn build_watch_rules(
    configs: &[WatchRuleConfig],
    paths: &BTreeMap<String, AssetPaths>,
) -> Result<Vec<WatchRule>> {
    configs
        .iter()
        .map(|cfg| {
            let action = match (&cfg.task, cfg.reload) {
                (None, true) => WatchAction::Reload,
                (Some(task), false) => WatchAction::RunTask(task.clone()),
                _ => anyhow::bail!(
                    "watch rule '{}' must set exactly one of `task` or `reload`",
                    cfg.label()
                ),
            };
            WatchRule::new(cfg.label(), &cfg.patterns(paths), action, cfg.use_hash)
        })
        .collect()
}

/// Rules whose patterns match `rel_path`, in declaration order.
pub fn matching_rules<'a>(rules: &'a [WatchRule], rel_path: &str) -> Vec<&'a WatchRule> {
    rules.iter().filter(|r| r.matches(rel_path)).collect()
}
