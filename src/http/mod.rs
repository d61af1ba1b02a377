use std::{io, net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use prometheus::{Registry, TextEncoder};
use tokio::net::TcpListener;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
struct HttpServiceState {
    metrics: Arc<Registry>,
}

/// Bind the listener of the internal metrics endpoint.
pub async fn bind(listen_on: SocketAddr) -> io::Result<TcpListener> {
    TcpListener::bind(listen_on).await
}

/// Serve the internal metrics over HTTP, until `shutdown_token` is cancelled.
///
/// # Arguments
///
/// * `listener` - Bound with [`bind`]
/// * `shutdown_token` - When cancelled, the server stops accepting requests and returns
/// * `metrics` - Registry gathered at every `GET /metrics`
pub async fn serve(listener: TcpListener, shutdown_token: CancellationToken, metrics: Arc<Registry>) -> io::Result<()> {
    let app = router(metrics);

    if let Ok(addr) = listener.local_addr() {
        info!("Begin listening on '{}'...", addr);
    }
    axum::serve(listener, app).with_graceful_shutdown(async move { shutdown_token.cancelled().await }).await
}

fn router(metrics: Arc<Registry>) -> Router {
    let state = HttpServiceState {
        metrics,
    };

    Router::new()
        .route("/", get(root))
        .route("/metrics", get(prometheus_metrics))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

async fn root() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"), ": internal metrics at /metrics\n")
}

async fn prometheus_metrics(State(state): State<HttpServiceState>) -> impl IntoResponse {
    let mut status = StatusCode::OK;
    let mut headers = HeaderMap::new();

    // As defined by Prometheus: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#basic-info
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"));

    let mut body = String::new();
    let metrics_family = state.metrics.gather();
    if let Err(e) = TextEncoder.encode_utf8(&metrics_family, &mut body) {
        status = StatusCode::INTERNAL_SERVER_ERROR;
        body = format!("Failed to encode metrics: {e}");
    }

    (status, headers, body)
}
