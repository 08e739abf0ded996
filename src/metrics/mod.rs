//! Turning Atlas measurements into Prometheus metrics.
//!
//! This module holds the unit catalog, the name and value transformations,
//! the metric descriptors built from measurement metadata, and the
//! per-process [`ResourceCollector`] that ties them together.

pub mod collector;
pub mod data;
pub mod descriptor;
pub mod measurer;
pub mod traits;
pub mod transform;
pub mod units;

// Re-export commonly used items
pub use collector::{FailureCause, Outcome, ResourceCollector};
pub use data::{Measurement, MeasurementId, MeasurementMap, MeasurementMetadata, MetadataMap, Sample};
pub use descriptor::{build_descriptor, MetricDescriptor, NAMESPACE};
pub use measurer::{DiskMeasurer, ProcessMeasurer};
pub use traits::Measurer;
pub use transform::{select_value, transform_name, transform_type};
pub use units::Unit;
