//! Monitor HTTP Server - Health, Metrics and Readiness Endpoints
//!
//! Exposes the freshness monitor through an axum router:
//! - `/health`  — datastore liveness (200 / 503)
//! - `/metrics` — Prometheus text exposition (always 200)
//! - `/ready`   — fail-fast ingestion readiness (200 / 503)
//!
//! Connections are served by a hyper-util auto (HTTP/1 + HTTP/2)
//! builder so slow clients are cut off by a read-header timeout.
//! Shutdown stops accepting connections, drains in-flight requests for
//! a bounded grace period, then aborts whatever is left.

use std::net::SocketAddr;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::exposition::{render_metrics, CONTENT_TYPE};
use crate::usecases::monitor::FreshnessMonitor;

/// Build the endpoint router over a monitor.
pub fn router(monitor: FreshnessMonitor) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ready", get(ready))
        .with_state(monitor)
}

/// Monitor HTTP server.
pub struct MonitorServer {
    monitor: FreshnessMonitor,
    /// Bind address (e.g. `0.0.0.0:9100`).
    addr: String,
    /// Drain budget after shutdown is requested.
    shutdown_timeout: Duration,
    /// Budget for a client to send complete request headers.
    read_header_timeout: Duration,
}

impl MonitorServer {
    /// Create a new monitor server.
    pub const fn new(
        monitor: FreshnessMonitor,
        addr: String,
        shutdown_timeout: Duration,
        read_header_timeout: Duration,
    ) -> Self {
        Self {
            monitor,
            addr,
            shutdown_timeout,
            read_header_timeout,
        }
    }

    /// Bind and serve until `shutdown` is cancelled.
    ///
    /// # Errors
    /// Returns error if binding fails.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` is cancelled.
    ///
    /// Returns once every connection has drained or `shutdown_timeout`
    /// has passed since cancellation, whichever comes first. The
    /// listener is dropped as soon as shutdown starts.
    ///
    /// # Errors
    /// Currently infallible; accept errors are logged and skipped.
    #[instrument(skip_all, fields(address = %self.addr))]
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let app = router(self.monitor);
        let builder = Arc::new(connection_builder(self.read_header_timeout));
        let mut connections = JoinSet::new();

        info!(
            address = %listener.local_addr().map_or_else(|_| self.addr.clone(), |a| a.to_string()),
            read_header_timeout_ms = self.read_header_timeout.as_millis(),
            "Monitor server listening"
        );

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,

                Some(_) = connections.join_next(), if !connections.is_empty() => {}

                accepted = listener.accept() => {
                    let (stream, remote) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "Accept failed");
                            continue;
                        }
                    };
                    connections.spawn(serve_connection(
                        Arc::clone(&builder),
                        stream,
                        app.clone(),
                        shutdown.clone(),
                        remote,
                    ));
                }
            }
        }

        drop(listener);
        info!(
            grace_ms = self.shutdown_timeout.as_millis(),
            open_connections = connections.len(),
            "Shutdown requested, draining requests"
        );

        let drain = async { while connections.join_next().await.is_some() {} };
        if tokio::time::timeout(self.shutdown_timeout, drain).await.is_err() {
            warn!(
                remaining = connections.len(),
                "Graceful shutdown timed out, closing remaining connections"
            );
            connections.shutdown().await;
        }

        info!("Server stopped");
        Ok(())
    }
}

fn connection_builder(read_header_timeout: Duration) -> auto::Builder<TokioExecutor> {
    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(Some(read_header_timeout))
        .keep_alive(true);
    builder
}

/// Serve one connection; on shutdown let the current request finish,
/// then close.
async fn serve_connection(
    builder: Arc<auto::Builder<TokioExecutor>>,
    stream: TcpStream,
    app: Router,
    shutdown: CancellationToken,
    remote: SocketAddr,
) {
    let mut conn = pin!(builder.serve_connection(TokioIo::new(stream), TowerToHyperService::new(app)));
    let mut cancelled = pin!(shutdown.cancelled());
    let mut draining = false;

    loop {
        tokio::select! {
            res = conn.as_mut() => {
                if let Err(e) = res {
                    debug!(remote = %remote, error = %e, "Connection closed with error");
                }
                break;
            }
            () = &mut cancelled, if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

async fn health(State(monitor): State<FreshnessMonitor>) -> Response {
    match monitor.health().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "db_unavailable" })),
        )
            .into_response(),
    }
}

async fn metrics(State(monitor): State<FreshnessMonitor>) -> Response {
    let scrape = monitor.scrape().await;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, CONTENT_TYPE)],
        render_metrics(&scrape),
    )
        .into_response()
}

async fn ready(State(monitor): State<FreshnessMonitor>) -> Response {
    let verdict = monitor.readiness().await;
    let status = if verdict.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(verdict.body())).into_response()
}
