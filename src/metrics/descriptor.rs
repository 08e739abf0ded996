//! Metric descriptors built from measurement metadata.

use crate::error::Result;
use crate::metrics::data::{MeasurementId, MeasurementMetadata};
use crate::metrics::transform::{transform_name, transform_type};
use crate::metrics::units::Unit;
use prometheus::core::{Collector, Desc};
use prometheus::proto::{MetricFamily, MetricType};
use prometheus::{GaugeVec, Opts};
use std::collections::HashMap;

/// Namespace shared by every series this exporter publishes.
pub const NAMESPACE: &str = "mongodbatlas";

/// Help text appended after the original measurement name.
pub const DEFAULT_HELP: &str = "Please see MongoDB Atlas documentation for details about the measurement";

/// A reusable metric description backed by one Atlas measurement kind.
///
/// Built once when a collector is created. The fully-qualified name and
/// label set never change afterwards, so what `describe` announces is what
/// a pull later emits.
#[derive(Clone)]
pub struct MetricDescriptor {
    pub fq_name: String,
    pub help: String,
    pub value_type: MetricType,
    pub const_labels: HashMap<String, String>,
    pub variable_labels: Vec<String>,
    pub measurement: MeasurementId,
    pub unit: Unit,
    gauge: GaugeVec,
}

impl std::fmt::Debug for MetricDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricDescriptor")
            .field("fq_name", &self.fq_name)
            .field("measurement", &self.measurement)
            .field("const_labels", &self.const_labels)
            .field("variable_labels", &self.variable_labels)
            .finish()
    }
}

impl MetricDescriptor {
    /// Descriptors the exposition registry uses to validate this metric.
    pub fn desc(&self) -> Vec<&Desc> {
        self.gauge.desc()
    }

    /// Record the value for one combination of variable label values.
    pub fn set(&self, label_values: &[&str], value: f64) {
        self.gauge.with_label_values(label_values).set(value);
    }

    /// Drop every recorded value; a cleared descriptor emits no samples.
    pub fn clear(&self) {
        self.gauge.reset();
    }

    /// Emit the currently recorded values.
    pub fn collect(&self) -> Vec<MetricFamily> {
        self.gauge.collect()
    }
}

/// Build a descriptor for one measurement kind.
///
/// Fails when the measurement's name or unit cannot be transformed, or when
/// the resulting name or labels are rejected by the metrics library.
pub fn build_descriptor(
    metadata: &MeasurementMetadata,
    namespace: &str,
    prefix: &str,
    variable_labels: &[&str],
    const_labels: HashMap<String, String>,
) -> Result<MetricDescriptor> {
    let name = transform_name(&metadata.name, &metadata.unit)?;
    let unit = metadata.unit.parse::<Unit>()?;
    let help = format!("Original measurements.name: '{}'. {}", metadata.name, DEFAULT_HELP);

    let opts = Opts::new(name, help.clone())
        .namespace(namespace)
        .subsystem(prefix)
        .const_labels(const_labels.clone());
    let fq_name = opts.fq_name();
    let gauge = GaugeVec::new(opts, variable_labels)?;

    Ok(MetricDescriptor {
        fq_name,
        help,
        value_type: transform_type(metadata),
        const_labels,
        variable_labels: variable_labels.iter().map(|l| l.to_string()).collect(),
        measurement: metadata.id(),
        unit,
        gauge,
    })
}
