//! Process and disk measurers.

use crate::atlas::{AtlasClient, Disk, Process};
use crate::error::Result;
use crate::metrics::data::{MeasurementMap, MetadataMap};
use crate::metrics::traits::Measurer;
use async_trait::async_trait;
use std::collections::HashMap;

/// Subsystem of process series, including the collector's bookkeeping series.
pub const PROCESSES_PREFIX: &str = "processes_stats";

/// Subsystem of disk series.
pub const DISKS_PREFIX: &str = "disks_stats";

/// Measures one database process.
#[derive(Debug, Clone)]
pub struct ProcessMeasurer {
    pub process: Process,
}

impl ProcessMeasurer {
    pub fn new(process: Process) -> Self {
        Self { process }
    }

    /// Constant labels plus the process version, for the info series only.
    pub fn info_labels(&self) -> HashMap<String, String> {
        let mut labels = self.const_labels();
        labels.insert("version".to_string(), self.process.version.clone());
        labels
    }
}

/// Identity labels shared by a process and its disks.
fn process_labels(process: &Process) -> HashMap<String, String> {
    HashMap::from([
        ("project_id".to_string(), process.project_id.clone()),
        ("rs_name".to_string(), process.replica_set_name.clone()),
        // mongos and mongod often share a host; the port tells them apart
        (
            "user_alias".to_string(),
            format!("{}:{}", process.user_alias, process.port),
        ),
        ("type_name".to_string(), process.type_name.clone()),
    ])
}

#[async_trait]
impl Measurer for ProcessMeasurer {
    fn prefix(&self) -> &'static str {
        PROCESSES_PREFIX
    }

    fn const_labels(&self) -> HashMap<String, String> {
        process_labels(&self.process)
    }

    fn describe(&self) -> String {
        format!("process {} ({})", self.process.id, self.process.type_name)
    }

    async fn metadata(&self, client: &dyn AtlasClient) -> Result<MetadataMap> {
        client.process_metadata(&self.process).await
    }

    async fn measurements(&self, client: &dyn AtlasClient) -> Result<MeasurementMap> {
        client.process_measurements(&self.process).await
    }
}

/// Measures one disk partition of a process.
#[derive(Debug, Clone)]
pub struct DiskMeasurer {
    pub process: Process,
    pub disk: Disk,
}

impl DiskMeasurer {
    pub fn new(process: Process, disk: Disk) -> Self {
        Self { process, disk }
    }
}

#[async_trait]
impl Measurer for DiskMeasurer {
    fn prefix(&self) -> &'static str {
        DISKS_PREFIX
    }

    fn const_labels(&self) -> HashMap<String, String> {
        let mut labels = process_labels(&self.process);
        labels.insert("partition_name".to_string(), self.disk.partition_name.clone());
        labels
    }

    fn describe(&self) -> String {
        format!("disk {} of process {}", self.disk.partition_name, self.process.id)
    }

    fn partition_name(&self) -> &str {
        &self.disk.partition_name
    }

    async fn metadata(&self, client: &dyn AtlasClient) -> Result<MetadataMap> {
        client.disk_metadata(&self.process, &self.disk).await
    }

    async fn measurements(&self, client: &dyn AtlasClient) -> Result<MeasurementMap> {
        client.disk_measurements(&self.process, &self.disk).await
    }
}
