//! Fleet reconciliation.
//!
//! The [`Reconciler`] keeps the [`CollectorRegistry`] in line with the
//! processes Atlas currently reports: collectors of vanished processes are
//! unregistered, and new processes get a collector built under bounded
//! exponential backoff.

pub mod backoff;
pub mod registry;

pub use backoff::{Backoff, Clock, ManualClock, TokioClock};
pub use registry::CollectorRegistry;

use crate::atlas::{AtlasClient, Process};
use crate::error::Result;
use crate::metrics::{ResourceCollector, NAMESPACE};
use futures_util::future::join_all;
use prometheus::{Gauge, IntCounterVec, IntGauge, Opts};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

const SUBSYSTEM: &str = "registerer";

/// Namespace of the exporter build series.
pub const EXPORTER_NAMESPACE: &str = "mongodbatlas_exporter";

/// What one reconciliation pass changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Whether the process listing succeeded
    pub listed: bool,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Identities whose collector could not be built this pass
    pub failed: Vec<String>,
}

/// Keeps one collector registered per live Atlas process.
pub struct Reconciler {
    client: Arc<dyn AtlasClient>,
    registry: Arc<CollectorRegistry>,
    backoff: Backoff,
    clock: Arc<dyn Clock>,
    list_failures: IntCounterVec,
    collectors: IntGauge,
    up: Gauge,
}

impl Reconciler {
    /// Create a reconciler and register its own series with the registry.
    pub fn new(client: Arc<dyn AtlasClient>, registry: Arc<CollectorRegistry>) -> Result<Self> {
        let list_failures = IntCounterVec::new(
            Opts::new(
                "list_failures_total",
                "Number of failed attempts to list the processes of the project.",
            )
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
            &["status"],
        )?;
        let collectors = IntGauge::with_opts(
            Opts::new("collectors", "Number of registered process collectors.")
                .namespace(NAMESPACE)
                .subsystem(SUBSYSTEM),
        )?;

        let up = Gauge::with_opts(
            Opts::new(
                "up",
                "Was the last communication with MongoDB Atlas API successful and Project is not empty.",
            )
            .namespace(NAMESPACE),
        )?;
        let build_info = Gauge::with_opts(
            Opts::new("build_info", "Build information of the running exporter.")
                .namespace(EXPORTER_NAMESPACE)
                .const_label("version", env!("CARGO_PKG_VERSION")),
        )?;
        build_info.set(1.0);

        registry.exposition().register(Box::new(list_failures.clone()))?;
        registry.exposition().register(Box::new(collectors.clone()))?;
        registry.exposition().register(Box::new(up.clone()))?;
        registry.exposition().register(Box::new(build_info))?;

        Ok(Self {
            client,
            registry,
            backoff: Backoff::default(),
            clock: Arc::new(TokioClock),
            list_failures,
            collectors,
            up,
        })
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &Arc<CollectorRegistry> {
        &self.registry
    }

    /// Whether the last listing succeeded and returned at least one process.
    pub fn is_up(&self) -> bool {
        self.up.get() == 1.0
    }

    /// Listing failures recorded for one status label.
    pub fn list_failures(&self, status: &str) -> u64 {
        self.list_failures
            .get_metric_with_label_values(&[status])
            .map(|counter| counter.get())
            .unwrap_or(0)
    }

    /// Run one pass: list, drop vanished collectors, build new ones.
    ///
    /// A failed listing leaves the registry untouched.
    pub async fn reconcile_once(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let processes = match self.client.list_processes().await {
            Ok(processes) => processes,
            Err(err) => {
                self.list_failures
                    .with_label_values(&[&err.status_label()])
                    .inc();
                self.up.set(0.0);
                error!(error = %err, "failed to list processes, keeping current collectors");
                return report;
            }
        };
        report.listed = true;
        self.up.set(if processes.is_empty() { 0.0 } else { 1.0 });

        let live: HashMap<String, Process> = processes
            .into_iter()
            .map(|process| (process.identity_key(), process))
            .collect();
        let registered = self.registry.keys().await;

        for key in registered.iter().filter(|key| !live.contains_key(*key)) {
            match self.registry.remove(key).await {
                Ok(Some(_)) => {
                    info!(collector = %key, "removed collector of vanished process");
                    report.removed.push(key.clone());
                }
                Ok(None) => {}
                Err(err) => error!(collector = %key, error = %err, "failed to unregister collector"),
            }
        }

        let pending: Vec<Process> = live
            .into_iter()
            .filter(|(key, _)| !registered.contains(key))
            .map(|(_, process)| process)
            .collect();
        let outcomes = join_all(pending.into_iter().map(|process| self.add(process))).await;
        for (key, added) in outcomes {
            if added {
                report.added.push(key);
            } else {
                report.failed.push(key);
            }
        }

        report.added.sort();
        report.removed.sort();
        report.failed.sort();
        self.collectors.set(self.registry.len().await as i64);
        report
    }

    /// Build and register the collector of one new process.
    async fn add(&self, process: Process) -> (String, bool) {
        let key = process.identity_key();
        let built = self
            .backoff
            .retry(self.clock.as_ref(), &key, || {
                ResourceCollector::new(self.client.clone(), process.clone())
            })
            .await;

        let collector = match built {
            Ok(collector) => Arc::new(collector),
            Err(err) => {
                warn!(collector = %key, error = %err, "giving up on collector until the next pass");
                return (key, false);
            }
        };

        match self.registry.insert(collector).await {
            Ok(true) => {
                info!(collector = %key, "added collector");
                (key, true)
            }
            Ok(false) => (key, true),
            Err(err) => {
                error!(collector = %key, error = %err, "failed to register collector");
                (key, false)
            }
        }
    }

    /// Reconcile immediately, then once per `period`, forever.
    pub async fn run(&self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let report = self.reconcile_once().await;
            debug!(
                listed = report.listed,
                added = report.added.len(),
                removed = report.removed.len(),
                failed = report.failed.len(),
                "reconciliation pass finished"
            );
        }
    }
}
