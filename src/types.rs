use std::str::FromStr;
use serde::Deserialize;

/// Behaviour when a watch trigger arrives for a task that is already running.
///
/// Both variants guarantee at most one in-flight execution per task name.
///
/// - `Queue`: remember the trigger and re-run the task once the current run
///   finishes. Repeated triggers coalesce into a single pending re-run
///   (default behaviour).
/// - `Ignore`: drop the trigger; the change is picked up by the next trigger
///   that arrives while the task is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerWhileRunningBehaviour {
    #[default]
    Queue,
    Ignore,
}

impl FromStr for TriggerWhileRunningBehaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queue" => Ok(TriggerWhileRunningBehaviour::Queue),
            "ignore" => Ok(TriggerWhileRunningBehaviour::Ignore),
            other => Err(format!(
                "invalid triggered_while_running_behaviour: {other} (expected \"queue\" or \"ignore\")"
            )),
        }
    }
}

/// Where per-step "last successful run" stamps are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StampStorageMode {
    /// Persist stamps in `<state_dir>/last_run`.
    #[default]
    File,
    /// Keep stamps in memory only (lost on restart).
    Memory,
}

/// Which directory of an asset class a step reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetLocation {
    /// The source globs (`src`).
    Src,
    /// The build output directory (`dest`).
    Dest,
    /// The distribution directory (`dist`).
    Dist,
}

impl AssetLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetLocation::Src => "src",
            AssetLocation::Dest => "dest",
            AssetLocation::Dist => "dist",
        }
    }
}

/// The three named top-level entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Dev,
    Prod,
    Dist,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Dev => "dev",
            Mode::Prod => "prod",
            Mode::Dist => "dist",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
