//! Atlas v1.0 REST API client with digest authentication.

use crate::atlas::digest::DigestChallenge;
use crate::atlas::{AtlasClient, Disk, Process};
use crate::config::AtlasConfig;
use crate::error::{ExporterError, Result};
use crate::metrics::data::{measurement_map, Measurement, MeasurementMap};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Sample resolution and window requested for every measurement fetch.
const MEASUREMENT_QUERY: [(&str, &str); 2] = [("granularity", "PT1M"), ("period", "PT2M")];

const ITEMS_PER_PAGE: &str = "500";

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Measurements {
    #[serde(default)]
    measurements: Vec<Measurement>,
}

struct NonceState {
    challenge: DigestChallenge,
    count: u32,
}

/// Client for the Atlas monitoring endpoints of one project.
pub struct HttpAtlasClient {
    http: reqwest::Client,
    config: AtlasConfig,
    nonce: Mutex<Option<NonceState>>,
}

impl HttpAtlasClient {
    /// Create a client for the configured project.
    pub fn new(config: AtlasConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("atlas_exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;
        debug!(project = %config.project_id, "Atlas client created");

        Ok(Self {
            http,
            config,
            nonce: Mutex::new(None),
        })
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let raw = format!(
            "{}/groups/{}{}",
            self.config.base_url, self.config.project_id, path
        );
        Url::parse_with_params(&raw, query)
            .map_err(|e| ExporterError::config_error(format!("Invalid Atlas URL {}: {}", raw, e)))
    }

    async fn authorization(&self, uri: &str) -> Option<String> {
        let mut nonce = self.nonce.lock().await;
        let state = nonce.as_mut()?;
        state.count += 1;
        let cnonce = uuid::Uuid::new_v4().simple().to_string();
        Some(state.challenge.authorization(
            &self.config.public_key,
            &self.config.private_key,
            "GET",
            uri,
            state.count,
            &cnonce,
        ))
    }

    /// GET a JSON document, answering a digest challenge once if needed.
    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.url(path, query)?;
        let uri = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        };

        let mut challenged = false;
        loop {
            let mut request = self.http.get(url.clone());
            if let Some(header) = self.authorization(&uri).await {
                request = request.header(AUTHORIZATION, header);
            }

            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && !challenged {
                let header = response
                    .headers()
                    .get(WWW_AUTHENTICATE)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        ExporterError::http_error(Some(401), "missing digest challenge")
                    })?;
                let challenge = DigestChallenge::parse(header)?;
                *self.nonce.lock().await = Some(NonceState {
                    challenge,
                    count: 0,
                });
                challenged = true;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ExporterError::http_error(
                    Some(status.as_u16()),
                    format!("GET {} failed: {}", url.path(), body.trim()),
                ));
            }

            let bytes = response.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }
    }
}

#[async_trait]
impl AtlasClient for HttpAtlasClient {
    async fn list_processes(&self) -> Result<Vec<Process>> {
        let page: Page<Process> = self
            .get_json("/processes", &[("itemsPerPage", ITEMS_PER_PAGE)])
            .await
            .map_err(|err| {
                error!(project = %self.config.project_id, error = %err, "failed to list processes of the project");
                err
            })?;

        Ok(page
            .results
            .into_iter()
            .filter(|process| self.config.tracks(&process.user_alias))
            .collect())
    }

    async fn list_disks(&self, process: &Process) -> Result<Vec<Disk>> {
        let path = format!("/processes/{}:{}/disks", process.hostname, process.port);
        let page: Page<Disk> = self
            .get_json(&path, &[("itemsPerPage", ITEMS_PER_PAGE)])
            .await?;
        Ok(page.results)
    }

    async fn process_measurements(&self, process: &Process) -> Result<MeasurementMap> {
        let path = format!("/processes/{}:{}/measurements", process.hostname, process.port);
        let body: Measurements = self.get_json(&path, &MEASUREMENT_QUERY).await?;
        Ok(measurement_map(body.measurements))
    }

    async fn disk_measurements(&self, process: &Process, disk: &Disk) -> Result<MeasurementMap> {
        let path = format!(
            "/processes/{}:{}/disks/{}/measurements",
            process.hostname, process.port, disk.partition_name
        );
        let body: Measurements = self.get_json(&path, &MEASUREMENT_QUERY).await?;
        Ok(measurement_map(body.measurements))
    }
}
