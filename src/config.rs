//! Exporter configuration.

use crate::error::{ExporterError, Result};
use crate::web::WebConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Atlas API endpoint.
pub const DEFAULT_ATLAS_BASE_URL: &str = "https://cloud.mongodb.com/api/atlas/v1.0";

/// How to reach and authenticate against the Atlas API, and what to watch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtlasConfig {
    /// API base URL without a trailing slash
    pub base_url: String,
    /// Programmatic API key, public part
    pub public_key: String,
    /// Programmatic API key, private part
    #[serde(skip_serializing)]
    pub private_key: String,
    /// Project (group) whose processes are exported
    pub project_id: String,
    /// Cluster names to export; empty exports every cluster in the project
    pub clusters: Vec<String>,
    /// Timeout of a single API request
    pub request_timeout: Duration,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ATLAS_BASE_URL.to_string(),
            public_key: String::new(),
            private_key: String::new(),
            project_id: String::new(),
            clusters: Vec::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl AtlasConfig {
    /// Create a configuration for one project with the given API key pair.
    pub fn new(
        public_key: impl Into<String>,
        private_key: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
            project_id: project_id.into(),
            ..Default::default()
        }
    }

    /// Set the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Restrict export to the given clusters.
    pub fn with_clusters(mut self, clusters: Vec<String>) -> Self {
        self.clusters = clusters;
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Whether a process alias belongs to one of the configured clusters.
    pub fn tracks(&self, user_alias: &str) -> bool {
        self.clusters.is_empty()
            || self
                .clusters
                .iter()
                .any(|cluster| user_alias.starts_with(cluster.as_str()))
    }
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    pub web: WebConfig,
    pub atlas: AtlasConfig,
    /// Time between two reconciliation passes
    pub reconcile_interval: Duration,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            atlas: AtlasConfig::default(),
            reconcile_interval: Duration::from_secs(crate::DEFAULT_RECONCILE_INTERVAL_SECS),
        }
    }
}

impl ExporterConfig {
    pub fn new(web: WebConfig, atlas: AtlasConfig) -> Self {
        Self {
            web,
            atlas,
            ..Default::default()
        }
    }

    /// Set the reconciliation interval.
    pub fn with_reconcile_interval(mut self, interval: Duration) -> Self {
        self.reconcile_interval = interval;
        self
    }

    /// Reject configurations the exporter cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.atlas.public_key.is_empty() || self.atlas.private_key.is_empty() {
            return Err(ExporterError::config_error("Atlas API public and private keys are required"));
        }
        if self.atlas.project_id.is_empty() {
            return Err(ExporterError::config_error("Atlas project id is required"));
        }
        if self.reconcile_interval.is_zero() {
            return Err(ExporterError::config_error("reconcile interval must be greater than zero"));
        }
        Ok(())
    }
}
