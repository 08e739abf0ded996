//! In-memory Atlas API used by tests.

use crate::atlas::{AtlasClient, Disk, Process};
use crate::error::{ExporterError, Result};
use crate::metrics::data::MeasurementMap;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct MockState {
    processes: Vec<Process>,
    disks: HashMap<String, Vec<Disk>>,
    default_measurements: MeasurementMap,
    process_measurements: HashMap<String, MeasurementMap>,
    disk_measurements: HashMap<(String, String), MeasurementMap>,
    listing_failure: Option<u16>,
    failing_fetches: HashSet<String>,
    pending_failures: HashMap<String, usize>,
}

/// Canned Atlas API whose contents tests can change between calls.
///
/// Processes without explicit measurements report the default set, so a
/// reconciliation test only needs to describe the fleet.
#[derive(Default)]
pub struct MockAtlasClient {
    state: Mutex<MockState>,
}

impl MockAtlasClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Measurements reported by any process or disk without explicit data.
    pub fn with_default_measurements(self, measurements: MeasurementMap) -> Self {
        self.state().default_measurements = measurements;
        self
    }

    /// Replace the live process list.
    pub fn set_processes(&self, processes: Vec<Process>) {
        self.state().processes = processes;
    }

    pub fn set_disks(&self, process_id: &str, disks: Vec<Disk>) {
        self.state().disks.insert(process_id.to_string(), disks);
    }

    pub fn set_process_measurements(&self, process_id: &str, measurements: MeasurementMap) {
        self.state()
            .process_measurements
            .insert(process_id.to_string(), measurements);
    }

    pub fn set_disk_measurements(&self, process_id: &str, partition: &str, measurements: MeasurementMap) {
        self.state()
            .disk_measurements
            .insert((process_id.to_string(), partition.to_string()), measurements);
    }

    /// Make `list_processes` fail with the given status, or succeed again with `None`.
    pub fn fail_listing(&self, status: Option<u16>) {
        self.state().listing_failure = status;
    }

    /// Make measurement fetches of one process (and its disks) fail or succeed.
    pub fn fail_fetches(&self, process_id: &str, failing: bool) {
        let mut state = self.state();
        if failing {
            state.failing_fetches.insert(process_id.to_string());
        } else {
            state.failing_fetches.remove(process_id);
        }
    }

    /// Make the next `times` measurement fetches of one process fail.
    pub fn fail_next_fetches(&self, process_id: &str, times: usize) {
        self.state()
            .pending_failures
            .insert(process_id.to_string(), times);
    }

    fn check_fetch(state: &MockState, process: &Process) -> Result<()> {
        if state.failing_fetches.contains(&process.id) {
            return Err(ExporterError::http_error(
                Some(503),
                format!("measurements of {} unavailable", process.id),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AtlasClient for MockAtlasClient {
    async fn list_processes(&self) -> Result<Vec<Process>> {
        let state = self.state();
        match state.listing_failure {
            Some(status) => Err(ExporterError::http_error(
                Some(status),
                "failed to list processes of the project",
            )),
            None => Ok(state.processes.clone()),
        }
    }

    async fn list_disks(&self, process: &Process) -> Result<Vec<Disk>> {
        Ok(self.state().disks.get(&process.id).cloned().unwrap_or_default())
    }

    async fn process_measurements(&self, process: &Process) -> Result<MeasurementMap> {
        let mut state = self.state();
        Self::check_fetch(&state, process)?;
        if let Some(remaining) = state.pending_failures.get_mut(&process.id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ExporterError::http_error(Some(500), "transient failure"));
            }
        }
        Ok(state
            .process_measurements
            .get(&process.id)
            .unwrap_or(&state.default_measurements)
            .clone())
    }

    async fn disk_measurements(&self, process: &Process, disk: &Disk) -> Result<MeasurementMap> {
        let state = self.state();
        Self::check_fetch(&state, process)?;
        let key = (process.id.clone(), disk.partition_name.clone());
        Ok(state
            .disk_measurements
            .get(&key)
            .unwrap_or(&state.default_measurements)
            .clone())
    }
}
