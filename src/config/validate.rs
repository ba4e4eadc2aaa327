// src/config/validate.rs

use std::collections::HashSet;

use globset::Glob;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, WatchRuleConfig, ASSET_CLASSES};
use crate::errors::{AssetdagError, Result};
use crate::types::{AssetLocation, Mode};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = AssetdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_unique_names(cfg)?;
    validate_paths(cfg)?;
    validate_steps(cfg)?;
    validate_cleans(cfg)?;
    validate_composites(cfg)?;
    validate_graph(cfg)?;
    validate_modes(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> AssetdagError {
    AssetdagError::ConfigError(msg.into())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.step.is_empty() && cfg.clean.is_empty() && cfg.task.is_empty() {
        return Err(config_error(
            "config must contain at least one [step.<name>], [clean.<name>] or [task.<name>] section",
        ));
    }
    Ok(())
}

fn validate_unique_names(cfg: &RawConfigFile) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    let names = cfg
        .step
        .keys()
        .chain(cfg.clean.keys())
        .chain(cfg.task.keys());

    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(config_error(format!(
                "task name '{name}' is declared more than once across [step], [clean] and [task]"
            )));
        }
    }
    Ok(())
}

fn validate_paths(cfg: &RawConfigFile) -> Result<()> {
    for (asset, paths) in cfg.paths.iter() {
        if !ASSET_CLASSES.contains(&asset.as_str()) {
            return Err(config_error(format!(
                "unknown asset class '{asset}' in [paths] (expected one of {ASSET_CLASSES:?})"
            )));
        }
        for pattern in paths.src.iter().chain(paths.watch_patterns()) {
            validate_glob(pattern)
                .map_err(|e| config_error(format!("[paths.{asset}]: {e}")))?;
        }
    }
    Ok(())
}

fn validate_glob(pattern: &str) -> std::result::Result<(), String> {
    let pattern_body = pattern.trim().trim_start_matches('!').trim_start_matches("./");
    Glob::new(pattern_body)
        .map(|_| ())
        .map_err(|e| format!("invalid glob pattern '{pattern}': {e}"))
}

fn validate_steps(cfg: &RawConfigFile) -> Result<()> {
    for (name, step) in cfg.step.iter() {
        // Disabled steps are still bound into the graph, so the asset must resolve.
        let paths = cfg.paths.get(&step.asset).ok_or_else(|| {
            config_error(format!(
                "step '{name}' references unknown asset class '{}'",
                step.asset
            ))
        })?;

        if !step.enabled {
            continue;
        }

        if step.output == AssetLocation::Src {
            return Err(config_error(format!(
                "step '{name}' cannot write to `src`; use output = \"dest\" or \"dist\""
            )));
        }

        match step.input {
            AssetLocation::Src => {
                if paths.src.is_empty() {
                    return Err(config_error(format!(
                        "step '{name}' reads `src` but [paths.{}] declares no src globs",
                        step.asset
                    )));
                }
            }
            location => {
                require_dir(name, &step.asset, paths.dir(location), location)?;
            }
        }

        require_dir(name, &step.asset, paths.dir(step.output), step.output)?;

        if step.input == step.output {
            return Err(config_error(format!(
                "step '{name}' reads and writes the same `{}` directory",
                step.output.as_str()
            )));
        }
    }
    Ok(())
}

fn require_dir(
    name: &str,
    asset: &str,
    dir: Option<&str>,
    location: AssetLocation,
) -> Result<()> {
    if dir.is_none() {
        return Err(config_error(format!(
            "step '{name}' needs [paths.{asset}].{} but it is empty or undefined",
            location.as_str()
        )));
    }
    Ok(())
}

fn validate_cleans(cfg: &RawConfigFile) -> Result<()> {
    for (name, clean) in cfg.clean.iter() {
        if clean.location == AssetLocation::Src {
            return Err(config_error(format!(
                "clean '{name}' cannot target `src` globs"
            )));
        }
        if clean.assets.is_empty() && clean.dirs.is_empty() {
            return Err(config_error(format!(
                "clean '{name}' must list at least one asset or dir"
            )));
        }
        for asset in clean.assets.iter() {
            let paths = cfg.paths.get(asset).ok_or_else(|| {
                config_error(format!(
                    "clean '{name}' references unknown asset class '{asset}'"
                ))
            })?;
            if paths.dir(clean.location).is_none() {
                return Err(config_error(format!(
                    "clean '{name}' needs [paths.{asset}].{} but it is empty or undefined",
                    clean.location.as_str()
                )));
            }
        }
        if clean.dirs.iter().any(|d| d.trim().is_empty()) {
            return Err(config_error(format!("clean '{name}' lists an empty dir")));
        }
    }
    Ok(())
}

fn validate_composites(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        let Some((_, children)) = task.combinator() else {
            return Err(config_error(format!(
                "task '{name}' must set exactly one of `sequence` or `parallel`"
            )));
        };
        if children.is_empty() {
            return Err(config_error(format!("task '{name}' has no children")));
        }
        for child in children {
            if child == name {
                return Err(AssetdagError::DagCycle(format!(
                    "cycle detected in task graph: task '{name}' references itself"
                )));
            }
            let known = cfg.step.contains_key(child)
                || cfg.clean.contains_key(child)
                || cfg.task.contains_key(child);
            if !known {
                return Err(config_error(format!(
                    "task '{name}' has unknown child '{child}'"
                )));
            }
        }
    }
    Ok(())
}

fn validate_graph(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: parent -> child. Leaves never have outgoing edges, so
    // only composites can take part in a cycle.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.step.keys().chain(cfg.clean.keys()).chain(cfg.task.keys()) {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for child in task.children() {
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

fn validate_modes(cfg: &RawConfigFile) -> Result<()> {
    let known = |name: &str| {
        cfg.step.contains_key(name) || cfg.clean.contains_key(name) || cfg.task.contains_key(name)
    };

    for (mode, mode_cfg) in cfg.mode.iter() {
        if !known(&mode_cfg.task) {
            return Err(config_error(format!(
                "[mode.{mode}] references unknown task '{}'",
                mode_cfg.task
            )));
        }
        for rule in mode_cfg.watch_rules.iter() {
            validate_watch_rule(cfg, mode, rule, &known)?;
        }
    }
    Ok(())
}

fn validate_watch_rule(
    cfg: &RawConfigFile,
    mode: Mode,
    rule: &WatchRuleConfig,
    known: &dyn Fn(&str) -> bool,
) -> Result<()> {
    let label = rule.label();

    match (&rule.pattern, &rule.asset) {
        (Some(pattern), None) => {
            validate_glob(pattern)
                .map_err(|e| config_error(format!("[mode.{mode}] watch rule: {e}")))?;
        }
        (None, Some(asset)) => {
            let paths = cfg.paths.get(asset).ok_or_else(|| {
                config_error(format!(
                    "[mode.{mode}] watch rule references unknown asset class '{asset}'"
                ))
            })?;
            if paths.watch_patterns().is_empty() {
                return Err(config_error(format!(
                    "[mode.{mode}] watch rule '{label}': asset class '{asset}' has no watch or src globs"
                )));
            }
        }
        _ => {
            return Err(config_error(format!(
                "[mode.{mode}] watch rule '{label}' must set exactly one of `pattern` or `asset`"
            )));
        }
    }

    match (&rule.task, rule.reload) {
        (Some(task), false) => {
            if !known(task) {
                return Err(config_error(format!(
                    "[mode.{mode}] watch rule '{label}' references unknown task '{task}'"
                )));
            }
        }
        (None, true) => {}
        _ => {
            return Err(config_error(format!(
                "[mode.{mode}] watch rule '{label}' must set exactly one of `task` or `reload = true`"
            )));
        }
    }
    Ok(())
}
