// src/reload/server.rs

use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::http::header;
use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;
use tracing::info;

/// Client script served at `/livereload.js`.
///
/// Stylesheet changes swap `<link>` hrefs in place; anything else reloads the
/// page.
pub fn livereload_script(reload_port: u16) -> String {
    format!(
        r#"(function () {{
  var socket = new WebSocket("ws://" + location.hostname + ":{reload_port}");
  socket.addEventListener("message", function (event) {{
    var msg = {{}};
    try {{ msg = JSON.parse(event.data); }} catch (e) {{}}
    if (msg.path && /\.css$/.test(msg.path)) {{
      document.querySelectorAll('link[rel="stylesheet"]').forEach(function (link) {{
        var url = new URL(link.href);
        url.searchParams.set("assetdag", Date.now());
        link.href = url.toString();
      }});
      return;
    }}
    window.location.reload();
  }});
}})();
"#
    )
}

/// Build the static site router: `root` as a fallback file service plus the
/// live-reload client script.
pub fn router(root: PathBuf, reload_port: u16) -> Router {
    let script = livereload_script(reload_port);
    Router::new()
        .route(
            "/livereload.js",
            get(move || {
                std::future::ready((
                    [(header::CONTENT_TYPE, "application/javascript")],
                    script.clone(),
                ))
            }),
        )
        .fallback_service(ServeDir::new(root))
}

/// Serve `root` over HTTP on `host:port` until the task is dropped.
pub async fn serve(host: &str, port: u16, root: PathBuf, reload_port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("binding static server on {host}:{port}"))?;

    info!(url = %format!("http://{host}:{port}/"), root = ?root, "starting static server");

    axum::serve(listener, router(root, reload_port))
        .await
        .context("static server failed")?;

    Ok(())
}
