// ────────────────────────────────
// src/server/listener.rs
// Low-level TCP bind for the metrics endpoint.
// ────────────────────────────────
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Bind the metrics socket. Failing here is fatal for the process; there is
/// no fallback port.
pub async fn bind_tcp(addr: SocketAddr) -> std::io::Result<TcpListener> {
    TcpListener::bind(addr).await
}
