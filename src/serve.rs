//! Static file server for a finished mirror.

use std::{net::SocketAddr, path::PathBuf};

use axum::Router;
use tower_http::services::ServeDir;
use tracing::info;

use crate::error::MirrorError;

/// Serves `dir` on `127.0.0.1:port` until the process is stopped.
///
/// Directory requests fall back to their `index.html`, so the mirrored root
/// document is what `/` returns.
pub async fn serve(dir: impl Into<PathBuf>, port: u16) -> Result<(), MirrorError> {
    let dir = dir.into();
    let app = Router::new().fallback_service(ServeDir::new(&dir));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("serving {} at http://{addr}", dir.display());

    axum::serve(listener, app).await?;
    Ok(())
}
