// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{
    AssetLocation, Mode, StampStorageMode, TriggerWhileRunningBehaviour,
};

/// Asset classes a `[paths.<asset>]` table may declare.
pub const ASSET_CLASSES: &[&str] = &[
    "styles",
    "scripts",
    "vendor-scripts",
    "images",
    "video",
    "fonts",
    "html",
];

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [paths.styles]
/// src  = ["assets/css/**/*.css", "assets/scss/*.scss"]
/// dest = "css"
///
/// [step."prod:styles"]
/// asset = "styles"
/// transforms = [{ kind = "scss" }, { kind = "concat", file = "app.css" }]
///
/// [task.prod]
/// sequence = ["dest:clean", "prod:build"]
/// ```
///
/// All sections are optional and have reasonable defaults; the
/// [`ConfigFile`] conversion rejects anything that cannot run.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub server: ServerSection,

    /// PathConfig: asset class -> globs and directories.
    #[serde(default)]
    pub paths: BTreeMap<String, AssetPaths>,

    /// Leaf file-processing steps from `[step.<name>]`.
    #[serde(default)]
    pub step: BTreeMap<String, StepConfig>,

    /// Leaf clean steps from `[clean.<name>]`.
    #[serde(default)]
    pub clean: BTreeMap<String, CleanConfig>,

    /// Composite tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// Top-level entry points from `[mode.dev]`, `[mode.prod]`, `[mode.dist]`.
    #[serde(default)]
    pub mode: ModesSection,
}

/// Validated configuration.
///
/// Can only be obtained through `ConfigFile::try_from(RawConfigFile)`, so
/// holding one means every reference resolves and the task graph is acyclic.
/// It is never mutated after load.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    server: ServerSection,
    paths: BTreeMap<String, AssetPaths>,
    steps: BTreeMap<String, StepConfig>,
    cleans: BTreeMap<String, CleanConfig>,
    tasks: BTreeMap<String, TaskConfig>,
    modes: ModesSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            server: raw.server,
            paths: raw.paths,
            steps: raw.step,
            cleans: raw.clean,
            tasks: raw.task,
            modes: raw.mode,
        }
    }

    pub fn config_section(&self) -> &ConfigSection {
        &self.config
    }

    pub fn server(&self) -> &ServerSection {
        &self.server
    }

    pub fn paths(&self) -> &BTreeMap<String, AssetPaths> {
        &self.paths
    }

    pub fn steps(&self) -> &BTreeMap<String, StepConfig> {
        &self.steps
    }

    pub fn cleans(&self) -> &BTreeMap<String, CleanConfig> {
        &self.cleans
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.tasks
    }

    pub fn mode(&self, mode: Mode) -> Option<&ModeConfig> {
        self.modes.get(mode)
    }

    pub fn modes(&self) -> &ModesSection {
        &self.modes
    }

    /// True if `name` is a step, clean or composite task.
    pub fn has_task(&self, name: &str) -> bool {
        self.steps.contains_key(name)
            || self.cleans.contains_key(name)
            || self.tasks.contains_key(name)
    }

    /// All task names across steps, cleans and composites.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.steps
            .keys()
            .chain(self.cleans.keys())
            .chain(self.tasks.keys())
            .map(|s| s.as_str())
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Directory (relative to the project root) for persisted state.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// `"queue"` (default) or `"ignore"`.
    #[serde(default)]
    pub triggered_while_running_behaviour: TriggerWhileRunningBehaviour,

    /// `"file"` (default) or `"memory"`.
    #[serde(default)]
    pub stamp_storage: StampStorageMode,
}

fn default_state_dir() -> String {
    ".assetdag".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            triggered_while_running_behaviour: TriggerWhileRunningBehaviour::default(),
            stamp_storage: StampStorageMode::default(),
        }
    }
}

/// `[server]` section: static dev server and live-reload socket.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_reload_port")]
    pub reload_port: u16,

    /// Directory served over HTTP, relative to the project root.
    #[serde(default = "default_server_root")]
    pub root: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_reload_port() -> u16 {
    35729
}

fn default_server_root() -> String {
    ".".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            reload_port: default_reload_port(),
            root: default_server_root(),
        }
    }
}

/// `[paths.<asset>]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetPaths {
    /// Source globs, relative to the project root.
    #[serde(default)]
    pub src: Vec<String>,

    /// Globs to watch; falls back to `src` when unset.
    #[serde(default)]
    pub watch: Option<Vec<String>>,

    /// Build output directory.
    #[serde(default)]
    pub dest: Option<String>,

    /// Distribution directory.
    #[serde(default)]
    pub dist: Option<String>,

    /// Extra import directories for stylesheet compilation.
    #[serde(default)]
    pub include_paths: Vec<String>,
}

impl AssetPaths {
    pub fn watch_patterns(&self) -> &[String] {
        self.watch.as_deref().unwrap_or(&self.src)
    }

    /// Directory for `location`, ignoring empty strings.
    ///
    /// Returns `None` for [`AssetLocation::Src`], which is a glob list.
    pub fn dir(&self, location: AssetLocation) -> Option<&str> {
        let dir = match location {
            AssetLocation::Src => None,
            AssetLocation::Dest => self.dest.as_deref(),
            AssetLocation::Dist => self.dist.as_deref(),
        };
        dir.map(str::trim).filter(|d| !d.is_empty())
    }
}

/// `[step.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    /// Asset class key into `[paths]`.
    pub asset: String,

    /// Where inputs come from: the `src` globs (default) or a built directory.
    #[serde(default = "default_input")]
    pub input: AssetLocation,

    /// Where outputs go: `dest` (default) or `dist`.
    #[serde(default = "default_output")]
    pub output: AssetLocation,

    /// Applied strictly in order; each consumes the previous output.
    #[serde(default)]
    pub transforms: Vec<TransformSpec>,

    /// Skip files not modified since the step's last successful run.
    #[serde(default)]
    pub since_last_run: bool,

    /// Fail with a missing-source error when no input files match.
    #[serde(default)]
    pub require_input: bool,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_input() -> AssetLocation {
    AssetLocation::Src
}

fn default_output() -> AssetLocation {
    AssetLocation::Dest
}

fn default_enabled() -> bool {
    true
}

/// A transform descriptor inside `transforms = [...]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformSpec {
    /// Compile SCSS/Sass/CSS to CSS.
    Scss {
        #[serde(default)]
        compressed: bool,
    },
    /// Re-emit stylesheets compressed.
    MinifyCss,
    /// Join every file into one.
    Concat {
        file: String,
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// Rewrite file names.
    Rename {
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        suffix: String,
        #[serde(default)]
        extension: Option<String>,
    },
    /// Re-encode PNG/JPEG images.
    OptimizeImages {
        #[serde(default = "default_quality")]
        quality: u8,
    },
    /// Prepend a header to every file.
    Banner { text: String },
}

fn default_separator() -> String {
    "\n".to_string()
}

fn default_quality() -> u8 {
    80
}

/// `[clean.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanConfig {
    /// Asset classes whose directories are emptied.
    #[serde(default)]
    pub assets: Vec<String>,

    /// Which directory of each asset class: `dest` (default) or `dist`.
    #[serde(default = "default_output")]
    pub location: AssetLocation,

    /// Extra directories, relative to the root or absolute.
    #[serde(default)]
    pub dirs: Vec<String>,
}

/// `[task.<name>]` section: exactly one of `sequence` / `parallel`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub sequence: Option<Vec<String>>,

    #[serde(default)]
    pub parallel: Option<Vec<String>>,
}

/// How a composite task runs its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Sequence,
    Parallel,
}

impl TaskConfig {
    /// The combinator and children, if exactly one combinator is set.
    pub fn combinator(&self) -> Option<(Combinator, &[String])> {
        match (&self.sequence, &self.parallel) {
            (Some(children), None) => Some((Combinator::Sequence, children)),
            (None, Some(children)) => Some((Combinator::Parallel, children)),
            _ => None,
        }
    }

    pub fn children(&self) -> &[String] {
        self.combinator().map(|(_, c)| c).unwrap_or(&[])
    }
}

/// `[mode]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModesSection {
    #[serde(default)]
    pub dev: Option<ModeConfig>,
    #[serde(default)]
    pub prod: Option<ModeConfig>,
    #[serde(default)]
    pub dist: Option<ModeConfig>,
}

impl ModesSection {
    pub fn get(&self, mode: Mode) -> Option<&ModeConfig> {
        match mode {
            Mode::Dev => self.dev.as_ref(),
            Mode::Prod => self.prod.as_ref(),
            Mode::Dist => self.dist.as_ref(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Mode, &ModeConfig)> {
        [
            (Mode::Dev, self.dev.as_ref()),
            (Mode::Prod, self.prod.as_ref()),
            (Mode::Dist, self.dist.as_ref()),
        ]
        .into_iter()
        .filter_map(|(m, c)| c.map(|c| (m, c)))
    }
}

/// `[mode.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ModeConfig {
    /// Top-level task executed by this mode.
    pub task: String,

    /// Start the static server and live-reload socket.
    #[serde(default)]
    pub serve: bool,

    /// Keep watching after the initial build.
    #[serde(default)]
    pub watch: bool,

    #[serde(default)]
    pub watch_rules: Vec<WatchRuleConfig>,
}

/// `[[mode.<name>.watch_rules]]` entry.
///
/// The rule watches either an explicit `pattern` or the `watch` globs of an
/// asset class (`asset`), and fires exactly one of `task` / `reload`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchRuleConfig {
    /// Glob matched against changed paths relative to the project root.
    #[serde(default)]
    pub pattern: Option<String>,

    /// Use the `[paths.<asset>]` watch globs instead of `pattern`.
    #[serde(default)]
    pub asset: Option<String>,

    #[serde(default)]
    pub task: Option<String>,

    #[serde(default)]
    pub reload: bool,

    /// Only fire when the changed file's content actually differs.
    #[serde(default)]
    pub use_hash: bool,
}

impl WatchRuleConfig {
    /// Human-readable name for log and error messages.
    pub fn label(&self) -> String {
        match (&self.pattern, &self.asset) {
            (Some(p), _) => p.clone(),
            (None, Some(a)) => format!("asset:{a}"),
            (None, None) => "<empty>".to_string(),
        }
    }

    /// Globs this rule watches, resolving `asset` through `paths`.
    pub fn patterns<'a>(&'a self, paths: &'a BTreeMap<String, AssetPaths>) -> Vec<&'a str> {
        match (&self.pattern, &self.asset) {
            (Some(p), _) => vec![p.as_str()],
            (None, Some(asset)) => paths
                .get(asset)
                .map(|p| p.watch_patterns().iter().map(String::as_str).collect())
                .unwrap_or_default(),
            (None, None) => Vec::new(),
        }
    }
}
