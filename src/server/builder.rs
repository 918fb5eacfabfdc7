// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use crate::server::handler::MetricsHandler;
use async_trait::async_trait;
use hyper::server::conn::Http;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Source of inbound connections for the metrics server.
#[async_trait]
pub trait Incoming: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl Incoming for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// Delay between failed accepts: starts at 5ms, doubles, capped at 1s,
/// and resets on the next successful accept.
#[derive(Debug, Default)]
struct AcceptBackoff {
    delay: Option<Duration>,
}

impl AcceptBackoff {
    fn next_delay(&mut self) -> Duration {
        let next = match self.delay {
            None => ACCEPT_BACKOFF_MIN,
            Some(delay) => (delay * 2).min(ACCEPT_BACKOFF_MAX),
        };
        self.delay = Some(next);
        next
    }

    fn reset(&mut self) {
        self.delay = None;
    }
}

/// HTTP server for the metrics endpoint. Construction takes an already
/// bound listener so bind failures surface before anything is spawned.
pub struct ExpositionServer {
    incoming: Box<dyn Incoming>,
    handler: MetricsHandler,
}

impl ExpositionServer {
    pub fn new(listener: TcpListener, handler: MetricsHandler) -> Self {
        Self::with_incoming(listener, handler)
    }

    pub fn with_incoming(incoming: impl Incoming + 'static, handler: MetricsHandler) -> Self {
        Self {
            incoming: Box::new(incoming),
            handler,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.incoming.local_addr()
    }

    /// Accept connections until `shutdown` fires, one task per connection.
    /// Scrapes only read the gauge, so they never wait on a probe. Accept
    /// errors (fd exhaustion, aborted handshakes) are logged and retried.
    pub async fn serve(self, shutdown: CancellationToken) {
        if let Ok(addr) = self.incoming.local_addr() {
            tracing::info!("Metrics server listening on {}", addr);
        }

        let mut backoff = AcceptBackoff::default();

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.incoming.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(conn) => {
                    backoff.reset();
                    conn
                }
                Err(err) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(%err, ?delay, "failed to accept connection, retrying");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => continue,
                    }
                }
            };

            let svc = self.handler.clone();
            let shutdown = shutdown.clone();

            tokio::spawn(async move {
                let conn = Http::new().serve_connection(stream, svc);
                tokio::pin!(conn);
                tokio::select! {
                    result = conn.as_mut() => {
                        if let Err(err) = result {
                            tracing::debug!(%peer, %err, "connection error");
                        }
                    }
                    _ = shutdown.cancelled() => {
                        conn.as_mut().graceful_shutdown();
                        let _ = conn.await;
                    }
                }
            });
        }

        tracing::info!("Metrics server shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsRegistry;
    use crate::server::bind_tcp;
    use hyper::{Client, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Fails the first `failures` accepts with `raw_os_error`, then hands
    /// out real connections.
    struct FlakyListener {
        inner: TcpListener,
        failures: usize,
        raw_os_error: i32,
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Incoming for FlakyListener {
        async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(io::Error::from_raw_os_error(self.raw_os_error));
            }
            self.inner.accept().await
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            self.inner.local_addr()
        }
    }

    fn handler() -> MetricsHandler {
        let registry = MetricsRegistry::new().unwrap();
        // The registry keeps the gauge alive after the writer is dropped.
        let _gauge = registry.register_liveness().unwrap();
        MetricsHandler::new(registry, "/metrics")
    }

    async fn flaky_server(failures: usize, raw_os_error: i32) -> (ExpositionServer, Arc<AtomicUsize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let listener = FlakyListener {
            inner: bind_tcp("127.0.0.1:0".parse().unwrap()).await.unwrap(),
            failures,
            raw_os_error,
            attempts: attempts.clone(),
        };
        (ExpositionServer::with_incoming(listener, handler()), attempts)
    }

    #[test]
    fn test_accept_backoff_doubles_and_caps() {
        let mut backoff = AcceptBackoff::default();
        let delays: Vec<_> = (0..10).map(|_| backoff.next_delay()).collect();

        assert_eq!(delays[0], Duration::from_millis(5));
        assert_eq!(delays[1], Duration::from_millis(10));
        assert_eq!(delays[2], Duration::from_millis(20));
        assert_eq!(delays[9], Duration::from_secs(1));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_server_survives_fd_exhaustion_on_accept() {
        // EMFILE: too many open files.
        let (server, attempts) = flaky_server(3, 24).await;
        let addr = server.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(server.serve(shutdown.clone()));

        let uri = format!("http://{}/metrics", addr).parse().unwrap();
        let response = tokio::time::timeout(Duration::from_secs(5), Client::new().get(uri))
            .await
            .expect("scrape should be served after accept errors")
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(attempts.load(Ordering::SeqCst) >= 4);
        assert!(!task.is_finished());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_during_accept_backoff() {
        // ECONNABORTED on every accept keeps the server in its backoff sleep.
        let (server, attempts) = flaky_server(usize::MAX, 103).await;
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(server.serve(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(attempts.load(Ordering::SeqCst) >= 2);
        assert!(!task.is_finished());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("server should stop while backing off")
            .unwrap();
    }
}
