// src/step/stamp.rs

//! Per-step "last successful run" stamps for the only-changed filter.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::engine::TaskName;
use crate::fs::FileSystem;
use crate::types::StampStorageMode;

/// File name (inside the state dir) holding persisted stamps.
pub const STAMP_FILE_NAME: &str = "last_run";

/// Abstract storage for step stamps.
pub trait StampStore: Send + Sync {
    fn load(&self, step: &str) -> Result<Option<SystemTime>>;
    fn save(&mut self, step: &str, at: SystemTime) -> Result<()>;
    /// Remove stamps for steps that are not in `active_steps`.
    fn prune(&mut self, active_steps: &[&str]) -> Result<()>;
    /// Drop the stamps of `steps`, so their next run processes every file.
    fn forget(&mut self, steps: &[&str]) -> Result<()>;
}

/// Shared handle used by every step of a graph.
pub type SharedStampStore = Arc<Mutex<Box<dyn StampStore>>>;

/// Build the store selected by `[config].stamp_storage`.
pub fn open_stamp_store(
    mode: StampStorageMode,
    state_dir: PathBuf,
    fs: Arc<dyn FileSystem>,
) -> SharedStampStore {
    let store: Box<dyn StampStore> = match mode {
        StampStorageMode::File => Box::new(FileStampStore::new(state_dir, fs)),
        StampStorageMode::Memory => Box::new(MemoryStampStore::new()),
    };
    Arc::new(Mutex::new(store))
}

fn to_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn from_millis(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms)
}

/// Stores stamps in `<state_dir>/last_run`, one `<step> <unix-millis>` per line.
pub struct FileStampStore {
    state_dir: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileStampStore {
    pub fn new(state_dir: PathBuf, fs: Arc<dyn FileSystem>) -> Self {
        Self { state_dir, fs }
    }

    fn path(&self) -> PathBuf {
        self.state_dir.join(STAMP_FILE_NAME)
    }

    fn load_all(&self) -> Result<HashMap<TaskName, u64>> {
        let path = self.path();
        if !self.fs.exists(&path) {
            return Ok(HashMap::new());
        }
        let bytes = self.fs.read(&path)?;
        let text = String::from_utf8(bytes)
            .with_context(|| format!("stamp file {:?} is not valid UTF-8", path))?;
        Ok(parse_stamps(&text))
    }

    fn save_all(&self, map: &HashMap<TaskName, u64>) -> Result<()> {
        let mut names: Vec<&TaskName> = map.keys().collect();
        names.sort();

        let mut out = String::new();
        for name in names {
            out.push_str(&format!("{} {}\n", name, map[name]));
        }
        self.fs.write(&self.path(), out.as_bytes())
    }
}

fn parse_stamps(text: &str) -> HashMap<TaskName, u64> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        // Split on the last space so step names may contain spaces.
        if let Some((name, ms)) = trimmed.rsplit_once(char::is_whitespace) {
            if let Ok(ms) = ms.trim().parse::<u64>() {
                map.insert(name.trim().to_string(), ms);
            }
        }
    }
    map
}

impl StampStore for FileStampStore {
    fn load(&self, step: &str) -> Result<Option<SystemTime>> {
        Ok(self.load_all()?.get(step).copied().map(from_millis))
    }

    fn save(&mut self, step: &str, at: SystemTime) -> Result<()> {
        let mut map = self.load_all()?;
        map.insert(step.to_string(), to_millis(at));
        self.save_all(&map)?;
        debug!(step = %step, at = to_millis(at), "stored step stamp (file)");
        Ok(())
    }

    fn prune(&mut self, active_steps: &[&str]) -> Result<()> {
        let mut map = self.load_all()?;
        let initial_len = map.len();
        map.retain(|k, _| active_steps.contains(&k.as_str()));

        if map.len() < initial_len {
            self.save_all(&map)?;
            info!(
                removed = initial_len - map.len(),
                "pruned stale step stamps (file)"
            );
        }
        Ok(())
    }

    fn forget(&mut self, steps: &[&str]) -> Result<()> {
        let mut map = self.load_all()?;
        let initial_len = map.len();
        map.retain(|k, _| !steps.contains(&k.as_str()));

        if map.len() < initial_len {
            self.save_all(&map)?;
            debug!(?steps, "forgot step stamps (file)");
        }
        Ok(())
    }
}

/// Stores stamps in memory only.
#[derive(Debug, Default)]
pub struct MemoryStampStore {
    map: HashMap<String, SystemTime>,
}

impl MemoryStampStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StampStore for MemoryStampStore {
    fn load(&self, step: &str) -> Result<Option<SystemTime>> {
        Ok(self.map.get(step).copied())
    }

    fn save(&mut self, step: &str, at: SystemTime) -> Result<()> {
        self.map.insert(step.to_string(), at);
        debug!(step = %step, "stored step stamp (memory)");
        Ok(())
    }

    fn prune(&mut self, active_steps: &[&str]) -> Result<()> {
        self.map.retain(|k, _| active_steps.contains(&k.as_str()));
        Ok(())
    }

    fn forget(&mut self, steps: &[&str]) -> Result<()> {
        self.map.retain(|k, _| !steps.contains(&k.as_str()));
        Ok(())
    }
}

/// Resolve `<root>/<state_dir>`.
pub fn state_dir(root: &Path, state_dir: &str) -> PathBuf {
    root.join(state_dir)
}
