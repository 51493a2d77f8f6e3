//! # Ops HTTP Surface
//!
//! Probes, version and metrics for every role, plus graceful shutdown:
//!
//! 1. shutdown fires, both probes start failing;
//! 2. wait `drain_delay_secs` so load balancers notice;
//! 3. stop accepting, let in-flight requests finish within
//!    `graceful_shutdown_timeout_secs`.

use crate::config::HttpConfig;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use crash_telemetry::encode_metrics;
use serde_json::json;
use shared_bus::ShutdownSignal;
use shared_types::Readiness;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

pub fn ops_router(readiness: Arc<Readiness>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/version", get(version))
        .route("/metrics", get(metrics))
        .with_state(readiness)
}

async fn healthz(State(readiness): State<Arc<Readiness>>) -> Response {
    probe(readiness.is_healthy())
}

async fn readyz(State(readiness): State<Arc<Readiness>>) -> Response {
    probe(readiness.is_ready())
}

fn probe(up: bool) -> Response {
    if up {
        (StatusCode::OK, "OK").into_response()
    } else {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    }
}

async fn version() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "rustVersion": env!("CARGO_PKG_RUST_VERSION"),
        "gitCommitHash": option_env!("AC_GIT_COMMIT").unwrap_or("unknown"),
        "buildTime": option_env!("AC_BUILD_TIME").unwrap_or("unknown"),
    }))
}

async fn metrics() -> Response {
    match encode_metrics() {
        Ok(text) => ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], text).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Serve `app` on `listener` until `shutdown` fires, then drain and stop.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    readiness: Arc<Readiness>,
    shutdown: ShutdownSignal,
    config: &HttpConfig,
) -> io::Result<()> {
    let drain_delay = Duration::from_secs(config.drain_delay_secs);
    let grace = Duration::from_secs(config.graceful_shutdown_timeout_secs);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    info!(addr = ?listener.local_addr().ok(), "HTTP server listening");
    let server = axum::serve(listener, app.layer(TraceLayer::new_for_http()))
        .with_graceful_shutdown(async move {
            let _ = stop_rx.await;
        });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server => {
            // Stopped without being asked.
            error!("HTTP server exited early");
            readiness.mark_unavailable();
            return result.map_err(io::Error::other)?;
        }
        _ = shutdown.cancelled() => {}
    }

    readiness.mark_unavailable();
    info!(drain_delay = ?drain_delay, "Probes failing, draining");
    tokio::time::sleep(drain_delay).await;

    info!(timeout = ?grace, "Shutting down HTTP server");
    let _ = stop_tx.send(());
    match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => {
            result.map_err(io::Error::other)??;
            info!("HTTP server stopped");
            Ok(())
        }
        Err(_) => {
            warn!("HTTP graceful shutdown timed out, aborting open connections");
            server.abort();
            Ok(())
        }
    }
}
