// src/watch/mod.rs

//! File watching and change routing.
//!
//! This module is responsible for:
//! - Compiling the active mode's watch rules (`globset`).
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Optional content hashing (`blake3`) so rules with `use_hash` only fire
//!   on real content changes.
//!
//! It does not know about the task graph; it only turns filesystem changes
//! into task triggers and reload requests.

pub mod event_handler;
pub mod hash;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use event_handler::{process_file_change, route_change, WatchContext};
pub use hash::{compute_file_hash, ContentCache};
pub use patterns::{build_watch_rules, matching_rules, WatchAction, WatchRule};
pub use watcher::{spawn_watcher, WatcherHandle};
