// tests/livereload.rs

mod common;
use crate::common::init_tracing;

use std::time::{Duration, Instant};

use assetdag::reload::server::router;
use assetdag::reload::{livereload_script, reload_message, LiveReloadServer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[test]
fn reload_message_is_json() {
    let msg = reload_message("css/app.min.css").unwrap();
    let value: serde_json::Value = serde_json::from_str(&msg).unwrap();

    assert_eq!(value["command"], "reload");
    assert_eq!(value["path"], "css/app.min.css");
}

#[test]
fn client_script_targets_the_reload_port() {
    let script = livereload_script(35729);
    assert!(script.contains(":35729"));
    assert!(script.contains("location.reload"));
}

#[test]
fn connected_clients_receive_broadcasts() {
    init_tracing();
    let server = LiveReloadServer::bind("127.0.0.1", 0).unwrap();
    assert_ne!(server.port(), 0);

    let (mut client, _) =
        tungstenite::connect(format!("ws://127.0.0.1:{}", server.port())).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while server.client_count() == 0 {
        assert!(Instant::now() < deadline, "client was never registered");
        std::thread::sleep(Duration::from_millis(10));
    }

    server.broadcast("index.html");

    let msg = client.read().unwrap();
    let value: serde_json::Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
    assert_eq!(value["path"], "index.html");
}

#[test]
fn broadcast_without_clients_is_harmless() {
    let server = LiveReloadServer::bind("127.0.0.1", 0).unwrap();
    server.broadcast("css/app.css");
    assert_eq!(server.client_count(), 0);
}

async fn get(port: u16, path: &str) -> String {
    let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn static_server_serves_site_and_client_script() {
    init_tracing();
    let site = tempfile::tempdir().unwrap();
    std::fs::write(site.path().join("index.html"), "<h1>Spa</h1>").unwrap();

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let app = router(site.path().to_path_buf(), 35729);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let page = get(port, "/index.html").await;
    assert!(page.starts_with("HTTP/1.1 200"), "{page}");
    assert!(page.contains("<h1>Spa</h1>"));

    let script = get(port, "/livereload.js").await;
    assert!(script.starts_with("HTTP/1.1 200"), "{script}");
    assert!(script.contains("application/javascript"));
    assert!(script.contains(":35729"));

    let missing = get(port, "/nope.css").await;
    assert!(missing.starts_with("HTTP/1.1 404"), "{missing}");
}
