//! Collector registry shared by the reconciler and the serving path.

use crate::error::Result;
use crate::metrics::ResourceCollector;
use futures_util::future::join_all;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Registry, TextEncoder};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registers a shared collector with the exposition registry.
struct SharedCollector(Arc<ResourceCollector>);

impl Collector for SharedCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.0.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.0.collect()
    }
}

/// Live collectors keyed by process identity, plus the registry they are
/// exposed through.
///
/// Readers take a snapshot of the map; only the reconciler mutates it.
pub struct CollectorRegistry {
    collectors: RwLock<HashMap<String, Arc<ResourceCollector>>>,
    registry: Registry,
}

impl Default for CollectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    /// Expose collectors through an existing registry.
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            collectors: RwLock::new(HashMap::new()),
            registry,
        }
    }

    /// The underlying exposition registry.
    pub fn exposition(&self) -> &Registry {
        &self.registry
    }

    pub async fn len(&self) -> usize {
        self.collectors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.collectors.read().await.is_empty()
    }

    /// Identity keys of the registered collectors.
    pub async fn keys(&self) -> BTreeSet<String> {
        self.collectors.read().await.keys().cloned().collect()
    }

    pub async fn get(&self, key: &str) -> Option<Arc<ResourceCollector>> {
        self.collectors.read().await.get(key).cloned()
    }

    /// Every registered collector at this instant.
    pub async fn snapshot(&self) -> Vec<Arc<ResourceCollector>> {
        self.collectors.read().await.values().cloned().collect()
    }

    /// Register a collector under its identity key.
    ///
    /// A collector already registered under the key is left in place and
    /// the new one is dropped.
    pub(crate) async fn insert(&self, collector: Arc<ResourceCollector>) -> Result<bool> {
        let key = collector.identity_key();
        let mut collectors = self.collectors.write().await;
        if collectors.contains_key(&key) {
            return Ok(false);
        }
        self.registry
            .register(Box::new(SharedCollector(collector.clone())))?;
        collectors.insert(key, collector);
        Ok(true)
    }

    /// Unregister and drop the collector of one identity.
    pub(crate) async fn remove(&self, key: &str) -> Result<Option<Arc<ResourceCollector>>> {
        let mut collectors = self.collectors.write().await;
        let Some(collector) = collectors.remove(key) else {
            return Ok(None);
        };
        self.registry
            .unregister(Box::new(SharedCollector(collector.clone())))?;
        Ok(Some(collector))
    }

    /// Refresh every registered collector concurrently.
    pub async fn pull_all(&self) {
        let collectors = self.snapshot().await;
        join_all(collectors.iter().map(|collector| collector.pull())).await;
    }

    /// Pull fresh measurements and render the registry in the text format.
    ///
    /// Returns the content type together with the encoded body.
    pub async fn render(&self) -> Result<(String, Vec<u8>)> {
        self.pull_all().await;

        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{MockAtlasClient, Process};
    use crate::metrics::data::{measurement_map, Measurement, Sample};

    fn process(id: &str, type_name: &str) -> Process {
        Process {
            id: id.to_string(),
            hostname: id.split(':').next().unwrap_or_default().to_string(),
            port: 27017,
            type_name: type_name.to_string(),
            replica_set_name: "rs0".to_string(),
            user_alias: id.to_string(),
            version: "6.0.12".to_string(),
            project_id: "p1".to_string(),
        }
    }

    async fn collector(process: Process) -> Arc<ResourceCollector> {
        let client = Arc::new(MockAtlasClient::new().with_default_measurements(measurement_map(
            vec![Measurement::new(
                "CONNECTIONS",
                "SCALAR",
                vec![Sample::new("2021-03-04T16:54:06Z", Some(4.0))],
            )],
        )));
        Arc::new(ResourceCollector::new(client, process).await.unwrap())
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_per_identity() {
        let registry = CollectorRegistry::new();
        let first = collector(process("hosta:27017", "REPLICA_PRIMARY")).await;
        let again = collector(process("hosta:27017", "REPLICA_PRIMARY")).await;

        assert!(registry.insert(first).await.unwrap());
        assert!(!registry.insert(again).await.unwrap());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_unregisters_series() {
        let registry = CollectorRegistry::new();
        let key = "hosta:27017REPLICA_PRIMARY";
        registry
            .insert(collector(process("hosta:27017", "REPLICA_PRIMARY")).await)
            .await
            .unwrap();

        let (_, body) = registry.render().await.unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("mongodbatlas_processes_stats_connections"));

        assert!(registry.remove(key).await.unwrap().is_some());
        assert!(registry.remove(key).await.unwrap().is_none());
        assert!(registry.exposition().gather().is_empty());
    }

    #[tokio::test]
    async fn test_render_pulls_before_encoding() {
        let registry = CollectorRegistry::new();
        registry
            .insert(collector(process("hosta:27017", "REPLICA_PRIMARY")).await)
            .await
            .unwrap();
        registry
            .insert(collector(process("hostb:27017", "REPLICA_SECONDARY")).await)
            .await
            .unwrap();

        let (content_type, body) = registry.render().await.unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(content_type.starts_with("text/plain"));
        assert_eq!(text.matches("mongodbatlas_processes_stats_scrapes_total{").count(), 2);
        assert!(text.contains("type_name=\"REPLICA_SECONDARY\""));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_render_during_role_swap() {
        use crate::reconciler::{ManualClock, Reconciler};

        let client = Arc::new(MockAtlasClient::new().with_default_measurements(measurement_map(
            vec![Measurement::new(
                "CONNECTIONS",
                "SCALAR",
                vec![Sample::new("2021-03-04T16:54:06Z", Some(4.0))],
            )],
        )));
        let registry = Arc::new(CollectorRegistry::new());
        let reconciler = Arc::new(
            Reconciler::new(client.clone(), registry.clone())
                .unwrap()
                .with_clock(Arc::new(ManualClock::new())),
        );

        let roles = [
            [("hosta:27017", "REPLICA_PRIMARY"), ("hostb:27017", "REPLICA_SECONDARY")],
            [("hosta:27017", "REPLICA_SECONDARY"), ("hostb:27017", "REPLICA_PRIMARY")],
        ];
        client.set_processes(roles[0].iter().map(|(id, role)| process(id, role)).collect());
        reconciler.reconcile_once().await;

        for round in 1..=6 {
            let current = roles[round % 2];
            client.set_processes(current.iter().map(|(id, role)| process(id, role)).collect());

            let reconciling = tokio::spawn({
                let reconciler = reconciler.clone();
                async move { reconciler.reconcile_once().await }
            });
            let rendering = tokio::spawn({
                let registry = registry.clone();
                async move { registry.render().await }
            });

            let report = reconciling.await.unwrap();
            let (_, body) = rendering.await.unwrap().unwrap();
            assert!(String::from_utf8(body).is_ok());
            assert_eq!(report.added.len(), 2);
            assert_eq!(report.removed.len(), 2);

            let expected: BTreeSet<String> = current
                .iter()
                .map(|(id, role)| format!("{}{}", id, role))
                .collect();
            assert_eq!(registry.keys().await, expected);
        }

        let (_, body) = registry.render().await.unwrap();
        let text = String::from_utf8(body).unwrap();
        assert_eq!(text.matches("mongodbatlas_processes_stats_scrapes_total{").count(), 2);
    }
}
