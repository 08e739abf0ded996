//! HTTP handlers.

use crate::web::AppState;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;

/// Pull every collector and return the Prometheus exposition.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.registry.render().await {
        Ok((content_type, body)) => ([(CONTENT_TYPE, content_type)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "atlas_exporter",
        "version": env!("CARGO_PKG_VERSION"),
        "collectors": state.registry.len().await,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Landing page pointing at the exposition.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(INDEX_HTML.replace("{metrics_path}", &state.metrics_path))
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>MongoDB Atlas Exporter</title>
</head>
<body>
    <h1>MongoDB Atlas Exporter</h1>
    <p><a href="{metrics_path}">Metrics</a></p>
    <p><a href="/health">Health</a></p>
</body>
</html>
"#;
