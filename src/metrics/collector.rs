//! Per-process metric collector.

use crate::atlas::{AtlasClient, Process};
use crate::error::{ExporterError, Result};
use crate::metrics::data::{MeasurementMap, MetadataMap};
use crate::metrics::descriptor::{build_descriptor, MetricDescriptor, NAMESPACE};
use crate::metrics::measurer::{DiskMeasurer, ProcessMeasurer, PROCESSES_PREFIX};
use crate::metrics::traits::Measurer;
use crate::metrics::transform::select_value;
use futures_util::future::join_all;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, IntCounter, IntCounterVec, Opts};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

const UP_HELP: &str = "Was the last communication with MongoDB Atlas API successful.";
const SCRAPES_HELP: &str = "Current total MongoDB Atlas scrapes.";
const SCRAPE_FAILURES_HELP: &str = "Number of unsuccessful measurement scrapes from MongoDB Atlas API.";
const TRANSFORMATION_FAILURES_HELP: &str =
    "Number of errors during transformation of scraped MongoDB Atlas measurements into Prometheus metrics.";
const INFO_HELP: &str = "Process info metric";

/// Why a known measurement produced no value during a pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCause {
    /// The fetch did not contain the measurement at all
    NotFound,
    /// The measurement had no samples
    NoData,
    /// The samples could not be turned into a value
    Value,
}

impl FailureCause {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureCause::NotFound => "not_found",
            FailureCause::NoData => "no_data",
            FailureCause::Value => "value",
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating one descriptor against one fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Value(f64),
    Failure(FailureCause),
}

/// Compute what a descriptor reports given a fresh set of measurements.
pub fn evaluate(descriptor: &MetricDescriptor, measurements: &MeasurementMap) -> Outcome {
    let Some(measurement) = measurements.get(&descriptor.measurement) else {
        return Outcome::Failure(FailureCause::NotFound);
    };

    match select_value(&measurement.samples, descriptor.unit) {
        Ok(value) => Outcome::Value(value),
        Err(ExporterError::NoData) => Outcome::Failure(FailureCause::NoData),
        Err(_) => Outcome::Failure(FailureCause::Value),
    }
}

/// One measured resource inside a collector, with its descriptors.
struct Target {
    measurer: Box<dyn Measurer>,
    descriptors: Vec<MetricDescriptor>,
    /// Last successful fetch, re-evaluated when a fetch fails
    cache: Mutex<MeasurementMap>,
}

impl Target {
    fn new(measurer: Box<dyn Measurer>, metadata: &MetadataMap) -> Self {
        let descriptors = build_descriptors(measurer.as_ref(), metadata);
        Self {
            measurer,
            descriptors,
            cache: Mutex::new(MeasurementMap::new()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build the descriptors of one resource, skipping measurements that cannot
/// be exposed.
fn build_descriptors(measurer: &dyn Measurer, metadata: &MetadataMap) -> Vec<MetricDescriptor> {
    let mut names = HashSet::new();
    let mut descriptors = Vec::with_capacity(metadata.len());

    for measurement in metadata.values() {
        match build_descriptor(
            measurement,
            NAMESPACE,
            measurer.prefix(),
            &[],
            measurer.const_labels(),
        ) {
            Ok(descriptor) if names.insert(descriptor.fq_name.clone()) => descriptors.push(descriptor),
            Ok(descriptor) => warn!(
                resource = %measurer.describe(),
                metric = %descriptor.fq_name,
                measurement = %measurement.name,
                "skipping measurement whose metric name is already taken"
            ),
            Err(err) => warn!(
                resource = %measurer.describe(),
                measurement = %measurement.name,
                unit = %measurement.unit,
                error = %err,
                "skipping measurement that cannot be transformed into a metric"
            ),
        }
    }

    descriptors
}

/// Collects every measurement of one Atlas process and its disks.
///
/// The descriptor set is fixed at construction. Each [`pull`](Self::pull)
/// refreshes measurements from the API; [`Collector::collect`] then emits
/// either a value or a classified failure for every known measurement.
pub struct ResourceCollector {
    client: Arc<dyn AtlasClient>,
    process: Process,
    targets: Vec<Target>,
    up: Gauge,
    scrapes_total: IntCounter,
    scrape_failures_total: IntCounter,
    transformation_failures_total: IntCounterVec,
    info: Gauge,
    emit: Mutex<()>,
}

impl ResourceCollector {
    /// Discover a process's measurements and build its collector.
    ///
    /// Fails when the process's own metadata cannot be discovered. A disk
    /// whose metadata cannot be discovered is left out.
    pub async fn new(client: Arc<dyn AtlasClient>, process: Process) -> Result<Self> {
        let process_measurer = ProcessMeasurer::new(process.clone());
        let labels = process_measurer.const_labels();
        let info_labels = process_measurer.info_labels();

        let metadata = process_measurer.metadata(client.as_ref()).await?;
        let mut targets = vec![Target::new(Box::new(process_measurer), &metadata)];

        // mongos disks never report data
        if !process.is_mongos() {
            for disk in client.list_disks(&process).await? {
                let measurer = DiskMeasurer::new(process.clone(), disk);
                match measurer.metadata(client.as_ref()).await {
                    Ok(metadata) => targets.push(Target::new(Box::new(measurer), &metadata)),
                    Err(err) => warn!(
                        resource = %measurer.describe(),
                        error = %err,
                        "could not get disk metadata"
                    ),
                }
            }
        }

        let opts = |name: &str, help: &str, labels: &HashMap<String, String>| {
            Opts::new(name, help)
                .namespace(NAMESPACE)
                .subsystem(PROCESSES_PREFIX)
                .const_labels(labels.clone())
        };

        let info = Gauge::with_opts(opts("info", INFO_HELP, &info_labels))?;
        info.set(1.0);

        Ok(Self {
            up: Gauge::with_opts(opts("up", UP_HELP, &labels))?,
            scrapes_total: IntCounter::with_opts(opts("scrapes_total", SCRAPES_HELP, &labels))?,
            scrape_failures_total: IntCounter::with_opts(opts(
                "scrape_failures_total",
                SCRAPE_FAILURES_HELP,
                &labels,
            ))?,
            transformation_failures_total: IntCounterVec::new(
                opts(
                    "measurement_transformation_failures_total",
                    TRANSFORMATION_FAILURES_HELP,
                    &labels,
                ),
                &["atlas_metric", "partition_name", "cause"],
            )?,
            info,
            client,
            process,
            targets,
            emit: Mutex::new(()),
        })
    }

    pub fn process(&self) -> &Process {
        &self.process
    }

    pub fn identity_key(&self) -> String {
        self.process.identity_key()
    }

    /// Every measurement descriptor, process first, then disks.
    pub fn descriptors(&self) -> impl Iterator<Item = &MetricDescriptor> {
        self.targets.iter().flat_map(|t| t.descriptors.iter())
    }

    /// Fetch fresh measurements and record a value or a failure for each
    /// known measurement.
    pub async fn pull(&self) {
        self.scrapes_total.inc();

        let fetches = join_all(
            self.targets
                .iter()
                .map(|target| target.measurer.measurements(self.client.as_ref())),
        )
        .await;

        let mut up = true;
        let mut snapshots = Vec::with_capacity(self.targets.len());
        for (target, fetch) in self.targets.iter().zip(fetches) {
            let mut cache = lock(&target.cache);
            match fetch {
                Ok(measurements) => *cache = measurements,
                Err(err) => {
                    debug!(resource = %target.measurer.describe(), error = %err, "scrape failure");
                    self.scrape_failures_total.inc();
                    up = false;
                }
            }
            snapshots.push(cache.clone());
        }
        self.up.set(if up { 1.0 } else { 0.0 });

        let _emit = lock(&self.emit);
        for (target, measurements) in self.targets.iter().zip(&snapshots) {
            for descriptor in &target.descriptors {
                descriptor.clear();
                match evaluate(descriptor, measurements) {
                    Outcome::Value(value) => descriptor.set(&[], value),
                    Outcome::Failure(cause) => {
                        self.transformation_failures_total
                            .with_label_values(&[
                                &descriptor.measurement.name,
                                target.measurer.partition_name(),
                                cause.as_str(),
                            ])
                            .inc();
                        debug!(
                            resource = %target.measurer.describe(),
                            metric = %descriptor.fq_name,
                            %cause,
                            "skipping metric"
                        );
                    }
                }
            }
        }
    }

    pub fn is_up(&self) -> bool {
        self.up.get() == 1.0
    }

    pub fn scrapes(&self) -> u64 {
        self.scrapes_total.get()
    }

    pub fn scrape_failures(&self) -> u64 {
        self.scrape_failures_total.get()
    }

    /// Failures recorded for one process measurement and cause.
    pub fn transformation_failures(&self, measurement: &str, cause: FailureCause) -> u64 {
        self.disk_transformation_failures("", measurement, cause)
    }

    /// Failures recorded for one measurement of one disk partition.
    pub fn disk_transformation_failures(
        &self,
        partition: &str,
        measurement: &str,
        cause: FailureCause,
    ) -> u64 {
        self.transformation_failures_total
            .get_metric_with_label_values(&[measurement, partition, cause.as_str()])
            .map(|counter| counter.get())
            .unwrap_or(0)
    }
}

impl Collector for ResourceCollector {
    fn desc(&self) -> Vec<&Desc> {
        let mut descs = Vec::new();
        descs.extend(self.up.desc());
        descs.extend(self.scrapes_total.desc());
        descs.extend(self.scrape_failures_total.desc());
        descs.extend(self.transformation_failures_total.desc());
        descs.extend(self.info.desc());
        for descriptor in self.descriptors() {
            descs.extend(descriptor.desc());
        }
        descs
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let _emit = lock(&self.emit);
        let mut families = Vec::new();
        families.extend(self.up.collect());
        families.extend(self.scrapes_total.collect());
        families.extend(self.scrape_failures_total.collect());
        families.extend(self.transformation_failures_total.collect());
        families.extend(self.info.collect());
        for descriptor in self.descriptors() {
            families.extend(descriptor.collect());
        }
        families
    }
}
