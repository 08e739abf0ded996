//! Web application router and middleware setup.

use crate::web::config::WebConfig;
use crate::web::{handlers, AppState};
use crate::reconciler::CollectorRegistry;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create the axum application serving the given registry.
pub fn create_app(config: &WebConfig, registry: Arc<CollectorRegistry>) -> Router {
    let state = AppState {
        registry,
        metrics_path: config.metrics_path.clone(),
    };

    Router::new()
        .route(&config.metrics_path, get(handlers::metrics))
        .route("/health", get(handlers::health_check))
        .route("/", get(handlers::index))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
