#![allow(dead_code)]

pub use assetdag_test_utils::{builders, fake_executor, init_tracing, with_timeout};

use std::sync::{Arc, Mutex};

/// Shared event log handed to scripted jobs.
pub fn new_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn snapshot(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().unwrap().clone()
}
