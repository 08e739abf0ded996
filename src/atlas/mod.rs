//! The MongoDB Atlas monitoring API, as seen by the exporter.
//!
//! [`AtlasClient`] is the seam between the exporter and the outside world:
//! [`http::HttpAtlasClient`] talks to the real REST API while
//! [`mock::MockAtlasClient`] serves canned data to tests.

pub mod digest;
pub mod http;
pub mod mock;

pub use http::HttpAtlasClient;
pub use mock::MockAtlasClient;

use crate::error::{ExporterError, Result};
use crate::metrics::data::{metadata_map, MeasurementMap, MetadataMap};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Process type of a mongos router; its disks never report data.
pub const TYPE_MONGOS: &str = "SHARD_MONGOS";

/// A database process as listed by Atlas.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    /// Unique `hostname:port` allotted by Atlas
    pub id: String,
    pub hostname: String,
    pub port: u16,
    /// Role of the process, e.g. `REPLICA_PRIMARY` or `SHARD_MONGOS`
    pub type_name: String,
    #[serde(default)]
    pub replica_set_name: String,
    /// User-facing hostname including the cluster name prefix
    #[serde(default)]
    pub user_alias: String,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "groupId", default)]
    pub project_id: String,
}

impl Process {
    /// Registry key: changes when the process changes role after an election.
    pub fn identity_key(&self) -> String {
        format!("{}{}", self.id, self.type_name)
    }

    pub fn is_mongos(&self) -> bool {
        self.type_name == TYPE_MONGOS
    }
}

/// A disk partition attached to a process.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    pub partition_name: String,
}

impl Disk {
    pub fn new(partition_name: impl Into<String>) -> Self {
        Self {
            partition_name: partition_name.into(),
        }
    }
}

/// Operations the exporter needs from the Atlas monitoring API.
#[async_trait]
pub trait AtlasClient: Send + Sync {
    /// List the live processes of the configured project, filtered by cluster.
    async fn list_processes(&self) -> Result<Vec<Process>>;

    /// List the disk partitions of one process.
    async fn list_disks(&self, process: &Process) -> Result<Vec<Disk>>;

    /// Fetch the latest measurements of one process.
    async fn process_measurements(&self, process: &Process) -> Result<MeasurementMap>;

    /// Fetch the latest measurements of one disk of a process.
    async fn disk_measurements(&self, process: &Process, disk: &Disk) -> Result<MeasurementMap>;

    /// Discover which measurement kinds a process reports.
    async fn process_metadata(&self, process: &Process) -> Result<MetadataMap> {
        let metadata = metadata_map(&self.process_measurements(process).await?);
        if metadata.is_empty() {
            return Err(ExporterError::http_error(
                None,
                format!("process {} does not report any measurements", process.id),
            ));
        }
        Ok(metadata)
    }

    /// Discover which measurement kinds a disk reports.
    async fn disk_metadata(&self, process: &Process, disk: &Disk) -> Result<MetadataMap> {
        let metadata = metadata_map(&self.disk_measurements(process, disk).await?);
        if metadata.is_empty() {
            return Err(ExporterError::http_error(
                None,
                format!(
                    "disk {} of process {} does not report any measurements",
                    disk.partition_name, process.id
                ),
            ));
        }
        Ok(metadata)
    }
}
