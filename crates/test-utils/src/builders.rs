#![allow(dead_code)]

use std::collections::BTreeMap;

use assetdag::config::{
    AssetPaths, CleanConfig, ConfigFile, ConfigSection, ModeConfig, ModesSection,
    RawConfigFile, ServerSection, StepConfig, TaskConfig, TransformSpec, WatchRuleConfig,
};
use assetdag::errors::Result;
use assetdag::types::{AssetLocation, Mode, StampStorageMode};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                server: ServerSection::default(),
                paths: BTreeMap::new(),
                step: BTreeMap::new(),
                clean: BTreeMap::new(),
                task: BTreeMap::new(),
                mode: ModesSection::default(),
            },
        }
    }

    pub fn with_paths(mut self, asset: &str, paths: AssetPaths) -> Self {
        self.config.paths.insert(asset.to_string(), paths);
        self
    }

    pub fn with_step(mut self, name: &str, step: StepConfig) -> Self {
        self.config.step.insert(name.to_string(), step);
        self
    }

    pub fn with_clean(mut self, name: &str, assets: &[&str], location: AssetLocation) -> Self {
        self.config.clean.insert(
            name.to_string(),
            CleanConfig {
                assets: assets.iter().map(|s| s.to_string()).collect(),
                location,
                dirs: Vec::new(),
            },
        );
        self
    }

    pub fn with_sequence(mut self, name: &str, children: &[&str]) -> Self {
        self.config.task.insert(
            name.to_string(),
            TaskConfig {
                sequence: Some(children.iter().map(|s| s.to_string()).collect()),
                parallel: None,
            },
        );
        self
    }

    pub fn with_parallel(mut self, name: &str, children: &[&str]) -> Self {
        self.config.task.insert(
            name.to_string(),
            TaskConfig {
                sequence: None,
                parallel: Some(children.iter().map(|s| s.to_string()).collect()),
            },
        );
        self
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_mode(mut self, mode: Mode, cfg: ModeConfig) -> Self {
        match mode {
            Mode::Dev => self.config.mode.dev = Some(cfg),
            Mode::Prod => self.config.mode.prod = Some(cfg),
            Mode::Dist => self.config.mode.dist = Some(cfg),
        }
        self
    }

    /// Keep stamps in memory so tests never write a state directory.
    pub fn with_memory_stamps(mut self) -> Self {
        self.config.config.stamp_storage = StampStorageMode::Memory;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `[paths.<asset>]` with the given source globs and directories.
pub fn asset_paths(src: &[&str], dest: Option<&str>, dist: Option<&str>) -> AssetPaths {
    AssetPaths {
        src: src.iter().map(|s| s.to_string()).collect(),
        watch: None,
        dest: dest.map(str::to_string),
        dist: dist.map(str::to_string),
        include_paths: Vec::new(),
    }
}

/// Builder for `StepConfig`.
pub struct StepConfigBuilder {
    step: StepConfig,
}

impl StepConfigBuilder {
    pub fn new(asset: &str) -> Self {
        Self {
            step: StepConfig {
                asset: asset.to_string(),
                input: AssetLocation::Src,
                output: AssetLocation::Dest,
                transforms: Vec::new(),
                since_last_run: false,
                require_input: false,
                enabled: true,
            },
        }
    }

    pub fn input(mut self, location: AssetLocation) -> Self {
        self.step.input = location;
        self
    }

    pub fn output(mut self, location: AssetLocation) -> Self {
        self.step.output = location;
        self
    }

    pub fn transform(mut self, spec: TransformSpec) -> Self {
        self.step.transforms.push(spec);
        self
    }

    pub fn since_last_run(mut self, val: bool) -> Self {
        self.step.since_last_run = val;
        self
    }

    pub fn require_input(mut self, val: bool) -> Self {
        self.step.require_input = val;
        self
    }

    pub fn enabled(mut self, val: bool) -> Self {
        self.step.enabled = val;
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}

/// `[mode.<m>]` running `task`, without watching.
pub fn mode(task: &str) -> ModeConfig {
    ModeConfig {
        task: task.to_string(),
        serve: false,
        watch: false,
        watch_rules: Vec::new(),
    }
}

/// Watch rule that re-runs `task` when `pattern` changes.
pub fn watch_task(pattern: &str, task: &str) -> WatchRuleConfig {
    WatchRuleConfig {
        pattern: Some(pattern.to_string()),
        task: Some(task.to_string()),
        ..WatchRuleConfig::default()
    }
}

/// Watch rule that only reloads clients when `pattern` changes.
pub fn watch_reload(pattern: &str) -> WatchRuleConfig {
    WatchRuleConfig {
        pattern: Some(pattern.to_string()),
        reload: true,
        ..WatchRuleConfig::default()
    }
}
