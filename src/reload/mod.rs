// src/reload/mod.rs

//! Live-reload plumbing for development modes.
//!
//! - [`livereload`] accepts websocket clients and broadcasts reload messages.
//! - [`server`] serves the built site over HTTP, including the small client
//!   script that connects to the reload socket.
//!
//! The watch runtime only sees the [`ReloadNotifier`] trait.

use tracing::{debug, info};

pub mod livereload;
pub mod server;

pub use livereload::{reload_message, LiveReloadServer};
pub use server::{livereload_script, serve};

/// Pushes a live-reload signal to connected development clients.
///
/// Fire-and-forget: implementations must not block the runtime and report
/// nothing back.
pub trait ReloadNotifier: Send {
    fn notify(&mut self, changed_path: &str);
}

/// Notifier used when no reload server is running; it only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ReloadNotifier for NoopNotifier {
    fn notify(&mut self, changed_path: &str) {
        debug!(path = %changed_path, "reload requested but no reload server is running");
    }
}

impl ReloadNotifier for LiveReloadServer {
    fn notify(&mut self, changed_path: &str) {
        info!(path = %changed_path, clients = self.client_count(), "reloading clients");
        self.broadcast(changed_path);
    }
}
