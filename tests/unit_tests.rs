use atlas_exporter::{
    metrics::data::{measurement_map, MeasurementMap},
    CollectorRegistry, ExporterError, FailureCause, ManualClock, Measurement, MockAtlasClient,
    Process, Reconciler, ResourceCollector, Sample, Unit,
};
use std::collections::BTreeSet;
use std::sync::Arc;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

fn process(id: &str, type_name: &str) -> Process {
    Process {
        id: format!("{}:27017", id),
        hostname: id.to_string(),
        port: 27017,
        type_name: type_name.to_string(),
        replica_set_name: "cluster0-shard-0".to_string(),
        user_alias: format!("cluster0-{}", id),
        version: "6.0.12".to_string(),
        project_id: "5e2211c17a3e5a48f5497de3".to_string(),
    }
}

fn measurements() -> MeasurementMap {
    measurement_map(vec![
        Measurement::new(
            "CONNECTIONS",
            "SCALAR",
            vec![Sample::new("2021-03-04T16:54:06Z", Some(31.0))],
        ),
        Measurement::new(
            "OPLOG_SLAVE_LAG_MASTER_TIME",
            "SECONDS",
            vec![Sample::new("2021-03-04T16:54:06Z", Some(0.0))],
        ),
    ])
}

fn keys(ids: &[(&str, &str)]) -> BTreeSet<String> {
    ids.iter()
        .map(|(id, type_name)| format!("{}:27017{}", id, type_name))
        .collect()
}

/// Test that every catalog unit transforms a nonempty name
#[test]
fn test_transform_name_every_unit() {
    for unit in Unit::ALL {
        let name = atlas_exporter::transform_name("QUERY_TARGETING_SCANNED_PER_RETURNED", unit.as_str())
            .unwrap();
        assert_eq!(
            name,
            format!("query_targeting_scanned_per_returned{}", unit.rules().name_suffix)
        );
    }
}

/// Test the error cases of name transformation
#[test]
fn test_transform_name_errors() {
    for unit in Unit::ALL {
        assert!(atlas_exporter::transform_name("", unit.as_str()).is_err());
    }
    assert!(atlas_exporter::transform_name("CONNECTIONS", "FURLONGS").is_err());
    assert!(atlas_exporter::transform_name("", "FURLONGS").is_err());
}

/// Test value selection on empty and all-null series
#[test]
fn test_select_value_edges() {
    assert!(matches!(
        atlas_exporter::select_value(&[], Unit::Scalar),
        Err(ExporterError::NoData)
    ));

    let nulls = vec![
        Sample::new("2021-03-04T16:53:06Z", None),
        Sample::new("2021-03-04T16:54:06Z", None),
    ];
    assert_eq!(atlas_exporter::select_value(&nulls, Unit::Gigabytes).unwrap(), 0.0);
}

/// Test that value selection ignores input order
#[test]
fn test_select_value_permutations() {
    let samples = vec![
        Sample::new("2021-03-04T16:53:06Z", Some(1.0)),
        Sample::new("2021-03-04T16:54:06Z", Some(3.0)),
        Sample::new("2021-03-04T16:54:06Z", Some(2.0)),
        Sample::new("2021-03-04T16:54:06Z", None),
    ];

    let expected = atlas_exporter::select_value(&samples, Unit::Scalar).unwrap();
    assert_eq!(expected, 3.0);

    let orders = [[0, 1, 2, 3], [3, 2, 1, 0], [1, 3, 0, 2], [2, 0, 3, 1], [3, 1, 2, 0]];
    for order in orders {
        let shuffled: Vec<Sample> = order.iter().map(|&i| samples[i].clone()).collect();
        assert_eq!(atlas_exporter::select_value(&shuffled, Unit::Scalar).unwrap(), expected);
    }
}

/// Test unit multipliers on selected values
#[test]
fn test_select_value_multipliers() {
    let gigabytes = vec![Sample::new("2021-03-04T16:54:06Z", Some(2.10016))];
    assert_eq!(
        atlas_exporter::select_value(&gigabytes, Unit::Gigabytes).unwrap(),
        2.10016 * GIB
    );

    let kilobytes = vec![
        Sample::new("2021-03-04T16:54:06Z", Some(2.10999)),
        Sample::new("2021-03-04T16:53:06Z", Some(1.5)),
    ];
    assert_eq!(
        atlas_exporter::select_value(&kilobytes, Unit::Kilobytes).unwrap(),
        2.10999 * 1024.0
    );
}

/// Test that the registry follows the live process list through an election
#[tokio::test]
async fn test_reconciliation_convergence() {
    let client = Arc::new(MockAtlasClient::new().with_default_measurements(measurements()));
    let registry = Arc::new(CollectorRegistry::new());
    let reconciler = Reconciler::new(client.clone(), registry.clone())
        .unwrap()
        .with_clock(Arc::new(ManualClock::new()));

    let a_primary = process("hosta", "REPLICA_PRIMARY");
    let b_secondary = process("hostb", "REPLICA_SECONDARY");

    client.set_processes(vec![a_primary.clone(), b_secondary.clone()]);
    reconciler.reconcile_once().await;
    assert_eq!(
        registry.keys().await,
        keys(&[("hosta", "REPLICA_PRIMARY"), ("hostb", "REPLICA_SECONDARY")])
    );

    client.set_processes(vec![a_primary.clone()]);
    reconciler.reconcile_once().await;
    assert_eq!(registry.keys().await, keys(&[("hosta", "REPLICA_PRIMARY")]));

    client.set_processes(vec![a_primary, b_secondary]);
    reconciler.reconcile_once().await;
    assert_eq!(registry.len().await, 2);

    client.set_processes(vec![
        process("hosta", "REPLICA_SECONDARY"),
        process("hostb", "REPLICA_PRIMARY"),
    ]);
    let report = reconciler.reconcile_once().await;
    assert_eq!(
        registry.keys().await,
        keys(&[("hosta", "REPLICA_SECONDARY"), ("hostb", "REPLICA_PRIMARY")])
    );
    assert_eq!(report.removed.len(), 2);
    assert_eq!(report.added.len(), 2);

    let (_, body) = registry.render().await.unwrap();
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("type_name=\"REPLICA_PRIMARY\",user_alias=\"cluster0-hostb:27017\""));
    assert!(!text.contains("type_name=\"REPLICA_SECONDARY\",user_alias=\"cluster0-hostb:27017\""));
}

/// Test that a missing measurement is counted once per pull and never reported
#[tokio::test]
async fn test_missing_measurement_is_not_found() {
    let client = Arc::new(MockAtlasClient::new().with_default_measurements(measurements()));
    let primary = process("hosta", "REPLICA_PRIMARY");
    let collector = ResourceCollector::new(client.clone(), primary.clone())
        .await
        .unwrap();

    let mut without_lag = measurements();
    without_lag.retain(|id, _| id.name != "OPLOG_SLAVE_LAG_MASTER_TIME");
    client.set_process_measurements(&primary.id, without_lag);

    for pulls in 1..=3 {
        collector.pull().await;
        assert_eq!(
            collector.transformation_failures("OPLOG_SLAVE_LAG_MASTER_TIME", FailureCause::NotFound),
            pulls
        );
    }

    let lag: Vec<_> = prometheus::core::Collector::collect(&collector)
        .into_iter()
        .filter(|mf| mf.get_name() == "mongodbatlas_processes_stats_oplog_slave_lag_master_time_seconds")
        .flat_map(|mf| mf.get_metric().to_vec())
        .collect();
    assert!(lag.is_empty());
    assert_eq!(
        collector.transformation_failures("CONNECTIONS", FailureCause::NotFound),
        0
    );
}
