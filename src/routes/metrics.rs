use axum::{extract::State, http::StatusCode};
use prometheus::{Encoder, TextEncoder};

use crate::{services::metrics::TENANT_CONNECTIONS_GAUGE, AppState};

/// GET /metrics, Prometheus text format. The cached-pool gauge is read from
/// the registry at scrape time.
pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    let stats = state.router.registry().stats().await;
    TENANT_CONNECTIONS_GAUGE.set(stats.cached_connections as f64);

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
