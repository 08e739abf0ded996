//! # Atlas Exporter - MongoDB Atlas metrics for Prometheus
//!
//! Polls the MongoDB Atlas monitoring API and exposes process and disk
//! measurements as Prometheus gauges.
//!
//! ## Features
//!
//! - **Fleet reconciliation**: one collector per live process, kept in sync
//!   with the project as processes appear, vanish or change role
//! - **Unit normalisation**: Atlas units become Prometheus base units and
//!   name suffixes
//! - **Failure classification**: every known measurement yields either a
//!   value or a `not_found` / `no_data` / `value` failure count on each scrape
//! - **Library + Binary**: use as a crate or standalone exporter
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use atlas_exporter::{AtlasConfig, CollectorRegistry, HttpAtlasClient, Reconciler, WebConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(HttpAtlasClient::new(AtlasConfig::new("public", "private", "project"))?);
//!     let registry = Arc::new(CollectorRegistry::new());
//!     let reconciler = Reconciler::new(client, registry.clone())?;
//!     reconciler.reconcile_once().await;
//!
//!     atlas_exporter::start_web_server(WebConfig::default(), registry, std::future::pending()).await?;
//!     Ok(())
//! }
//! ```

pub mod atlas;
pub mod config;
pub mod error;
pub mod metrics;
pub mod reconciler;
pub mod web;

// Re-export public API
pub use atlas::{AtlasClient, Disk, HttpAtlasClient, MockAtlasClient, Process};
pub use config::{AtlasConfig, ExporterConfig};
pub use error::{ExporterError, Result};
pub use metrics::{
    collector::{FailureCause, ResourceCollector},
    data::{Measurement, MeasurementId, MeasurementMetadata, Sample},
    descriptor::{build_descriptor, MetricDescriptor},
    transform::{select_value, transform_name, transform_type},
    units::Unit,
};
pub use reconciler::{Backoff, CollectorRegistry, ManualClock, ReconcileReport, Reconciler};
pub use web::{start_web_server, WebConfig};

/// The default time between reconciliation passes, in seconds
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 60;

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 9905;
