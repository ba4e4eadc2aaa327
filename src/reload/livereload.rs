// src/reload/livereload.rs

use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, error, warn};
use tungstenite::{Message, WebSocket};

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

/// Oldest connections beyond this count are closed after each broadcast.
const MAX_CLIENTS: usize = 32;

#[derive(Debug, Serialize)]
struct ReloadMessage<'a> {
    command: &'static str,
    path: &'a str,
}

/// JSON payload sent to clients for a changed path.
pub fn reload_message(path: &str) -> Result<String> {
    serde_json::to_string(&ReloadMessage {
        command: "reload",
        path,
    })
    .context("serializing reload message")
}

/// Websocket server for browser live reload.
///
/// One thread accepts clients, another broadcasts queued messages to them.
/// Clients whose socket broke are dropped on the next broadcast.
#[derive(Debug)]
pub struct LiveReloadServer {
    port: u16,
    clients: Clients,
    tx: Sender<String>,
}

impl LiveReloadServer {
    /// Bind the reload socket on `host:port` (`port = 0` picks a free port).
    pub fn bind(host: &str, port: u16) -> Result<Self> {
        let listener = TcpListener::bind((host, port))
            .with_context(|| format!("binding live-reload socket on {host}:{port}"))?;
        let port = listener
            .local_addr()
            .context("reading live-reload socket address")?
            .port();

        let clients: Clients = Arc::new(Mutex::new(Vec::new()));
        spawn_accept_thread(listener, Arc::clone(&clients));
        let tx = spawn_broadcast_thread(Arc::clone(&clients));

        Ok(Self { port, clients, tx })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn client_count(&self) -> usize {
        lock(&self.clients).len()
    }

    /// Queue a reload message for every connected client.
    pub fn broadcast(&self, changed_path: &str) {
        let payload = match reload_message(changed_path) {
            Ok(p) => p,
            Err(err) => {
                error!(error = %err, "could not build reload message");
                return;
            }
        };
        if self.tx.send(payload).is_err() {
            warn!("live-reload broadcast thread is gone");
        }
    }
}

fn lock(clients: &Clients) -> MutexGuard<'_, Vec<WebSocket<TcpStream>>> {
    clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn spawn_accept_thread(listener: TcpListener, clients: Clients) {
    thread::spawn(move || {
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(s) => s,
                Err(err) => {
                    warn!(error = %err, "live-reload accept failed");
                    continue;
                }
            };
            match tungstenite::accept(stream) {
                Ok(socket) => {
                    debug!("live-reload client connected");
                    lock(&clients).push(socket);
                }
                Err(err) => warn!(error = %err, "live-reload handshake failed"),
            }
        }
    });
}

fn spawn_broadcast_thread(clients: Clients) -> Sender<String> {
    let (tx, rx) = mpsc::channel::<String>();

    thread::spawn(move || {
        while let Ok(payload) = rx.recv() {
            let mut clients = lock(&clients);
            let mut broken = Vec::new();

            for (i, socket) in clients.iter_mut().enumerate() {
                match socket.send(Message::text(payload.clone())) {
                    Ok(()) => {}
                    Err(tungstenite::Error::Io(e)) => {
                        debug!(error = %e, "dropping live-reload client");
                        broken.push(i);
                    }
                    Err(tungstenite::Error::ConnectionClosed)
                    | Err(tungstenite::Error::AlreadyClosed) => broken.push(i),
                    Err(e) => error!("live-reload send failed: {e:?}"),
                }
            }

            for i in broken.into_iter().rev() {
                clients.remove(i);
            }

            let len = clients.len();
            if len > MAX_CLIENTS {
                for mut socket in clients.drain(0..len - MAX_CLIENTS) {
                    socket.close(None).ok();
                }
            }
        }
    });

    tx
}
