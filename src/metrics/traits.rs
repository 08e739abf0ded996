//! Traits shared by the resources a collector measures.

use crate::atlas::AtlasClient;
use crate::error::Result;
use crate::metrics::data::{MeasurementMap, MetadataMap};
use async_trait::async_trait;
use std::collections::HashMap;

/// A measurable Atlas resource: a process, or a disk attached to one.
///
/// Implementations know how to fetch their own measurements and which
/// constant labels identify them; collectors stay agnostic of the kind.
#[async_trait]
pub trait Measurer: Send + Sync {
    /// Metric subsystem the resource's series are published under.
    fn prefix(&self) -> &'static str;

    /// Labels uniquely identifying this resource.
    fn const_labels(&self) -> HashMap<String, String>;

    /// Short human-readable name used in logs.
    fn describe(&self) -> String;

    /// Disk partition measured, empty for a process.
    fn partition_name(&self) -> &str {
        ""
    }

    /// Discover which measurement kinds this resource reports.
    async fn metadata(&self, client: &dyn AtlasClient) -> Result<MetadataMap>;

    /// Fetch fresh measurements for this resource.
    async fn measurements(&self, client: &dyn AtlasClient) -> Result<MeasurementMap>;
}
