//! HTTP request handlers

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use serde::Serialize;
use tracing::{debug, instrument};

use super::AppState;
use crate::transformer::PrometheusFormatter;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    /// Whether any poll has succeeded yet
    ready: bool,
}

/// Root endpoint - basic info and links
pub async fn root(State(state): State<AppState>) -> Html<String> {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>mongo-collectd</title>
</head>
<body>
    <h1>mongo-collectd</h1>
    <p>Version: {}</p>
    <p>Plugin: {}</p>
    <ul>
        <li><a href="/health">Health Check</a></li>
        <li><a href="{}">Metrics</a></li>
    </ul>
</body>
</html>"#,
        env!("CARGO_PKG_VERSION"),
        state.config.collect.plugin.as_str(),
        state.config.server.path
    );
    Html(html)
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ready: !state.snapshot.is_empty(),
    })
}

/// Metrics endpoint - latest samples plus the poller's own counters
#[instrument(skip(state), name = "metrics_handler")]
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let samples = state.snapshot.samples();
    let formatter = PrometheusFormatter::new();

    let mut output = formatter.format_samples(&samples);
    output.push_str(&formatter.format(&state.metrics.to_prometheus_metrics()));
    output.push_str(&format!(
        "# HELP mongo_collectd_info mongo-collectd build information\n\
         # TYPE mongo_collectd_info gauge\n\
         mongo_collectd_info{{version=\"{}\"}} 1\n",
        env!("CARGO_PKG_VERSION")
    ));

    debug!(samples = samples.len(), "Serving metrics");

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}
