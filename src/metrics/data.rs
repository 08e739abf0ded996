//! Data structures for Atlas measurements.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies a kind of measurement within a resource: its name and unit symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeasurementId {
    pub name: String,
    pub unit: String,
}

impl MeasurementId {
    /// Create an identifier from a measurement name and unit symbol.
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
        }
    }
}

impl fmt::Display for MeasurementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.name, self.unit)
    }
}

/// Describes that a kind of measurement exists for a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementMetadata {
    pub name: String,
    #[serde(rename = "units")]
    pub unit: String,
}

impl MeasurementMetadata {
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
        }
    }

    pub fn id(&self) -> MeasurementId {
        MeasurementId::new(&self.name, &self.unit)
    }
}

/// One point of a measurement series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// ISO-8601 UTC timestamp with second precision, e.g. `2021-03-04T16:53:06Z`
    pub timestamp: String,
    /// `None` when Atlas reported no value for this instant
    pub value: Option<f64>,
}

impl Sample {
    pub fn new(timestamp: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            timestamp: timestamp.into(),
            value,
        }
    }
}

/// A named, unitted series of samples as returned by one fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    #[serde(rename = "units")]
    pub unit: String,
    #[serde(rename = "dataPoints", default)]
    pub samples: Vec<Sample>,
}

impl Measurement {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, samples: Vec<Sample>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            samples,
        }
    }

    pub fn id(&self) -> MeasurementId {
        MeasurementId::new(&self.name, &self.unit)
    }

    pub fn metadata(&self) -> MeasurementMetadata {
        MeasurementMetadata::new(&self.name, &self.unit)
    }
}

/// Fresh measurements of one resource, keyed by identifier.
pub type MeasurementMap = BTreeMap<MeasurementId, Measurement>;

/// Known measurement kinds of one resource, keyed by identifier.
pub type MetadataMap = BTreeMap<MeasurementId, MeasurementMetadata>;

/// Index a list of measurements by identifier.
pub fn measurement_map(measurements: impl IntoIterator<Item = Measurement>) -> MeasurementMap {
    measurements.into_iter().map(|m| (m.id(), m)).collect()
}

/// Derive the metadata of every measurement in a map.
pub fn metadata_map(measurements: &MeasurementMap) -> MetadataMap {
    measurements
        .iter()
        .map(|(id, m)| (id.clone(), m.metadata()))
        .collect()
}
