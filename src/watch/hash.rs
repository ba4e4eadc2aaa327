// src/watch/hash.rs

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// Compute the blake3 hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// In-memory record of the last content hash seen per file.
///
/// Editors often emit several events for a single save, and some emit events
/// without touching content at all; `use_hash` rules consult this cache so
/// only real content changes fire.
#[derive(Debug, Default)]
pub struct ContentCache {
    hashes: HashMap<PathBuf, String>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current hash of `path` and report whether it differs from
    /// the previously recorded one.
    ///
    /// A file seen for the first time counts as changed. A file that can no
    /// longer be read (deleted) is forgotten and also counts as changed.
    pub fn changed(&mut self, fs: &dyn FileSystem, path: &Path) -> bool {
        let hash = match compute_file_hash(fs, path) {
            Ok(h) => h,
            Err(err) => {
                debug!(?path, error = %err, "could not hash file; treating as changed");
                self.hashes.remove(path);
                return true;
            }
        };

        match self.hashes.insert(path.to_path_buf(), hash.clone()) {
            Some(previous) if previous == hash => {
                debug!(?path, "content unchanged");
                false
            }
            _ => true,
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
