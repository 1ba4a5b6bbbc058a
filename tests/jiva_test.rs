//! Tests for the jiva HTTP adapter against a fake controller.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use openebs_exporter::collectors::{Collector, VolumeCollector};
use openebs_exporter::metrics::VolumeMetrics;
use openebs_exporter::source::jiva::JivaSource;

const STATS_BODY: &str = r#"{"Name":"pvc-7aa","ReadIOPS":"120","WriteIOPS":"340","TotalReadBytes":"1073741824","TotalWriteBytes":"2147483648","TotalReadTime":"13","TotalWriteTime":"132","TotalReadBlockCount":"12","TotalWriteBlockCount":"15","Size":"10737418240","SectorSize":"4096","UsedLogicalBlocks":"1048576","UsedBlocks":"1048576","UpTime":10,"RevisionCounter":100,"ReplicaCounter":2,"Replicas":[{"Address":"tcp://172.18.0.3:9502","Mode":"RW"},{"Address":"tcp://172.18.0.4:9502","Mode":"RW"}],"actions":{},"links":{"self":"http://localhost:9501/v1/stats"},"type":"stats"}"#;

async fn spawn_controller(body: &'static str) -> SocketAddr {
    let router = Router::new().route("/v1/stats", get(move || async move { body }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn happy_path_sets_volume_gauges() {
    // Given: a controller serving stats with mixed string/number fields
    let addr = spawn_controller(STATS_BODY).await;

    let metrics = VolumeMetrics::new().unwrap();
    let collector = VolumeCollector::new(
        Box::new(JivaSource::new(&format!("http://{}", addr)).unwrap()),
        metrics.clone(),
    );

    // When: one scrape runs
    collector.collect().await;

    // Then: the gauges carry the converted values
    assert_eq!(metrics.reads.get(), 120.0);
    assert_eq!(metrics.writes.get(), 340.0);
    assert_eq!(metrics.size_of_volume.get(), 10.0);
    assert_eq!(metrics.total_read_bytes.get(), 1073741824.0);
    assert_eq!(metrics.logical_size.get(), 1048576.0 * 4096.0 / 1073741824.0);
    assert_eq!(metrics.total_replica_counter.get(), 2.0);
    assert_eq!(metrics.healthy_replica_counter.get(), 2.0);
    assert_eq!(metrics.degraded_replica_counter.get(), 0.0);
    // both replicas serve read-write and no explicit target status arrived
    assert_eq!(metrics.volume_status.get(), 3.0);
    assert_eq!(
        metrics
            .volume_uptime
            .with_label_values(&["pvc-7aa", "jiva"])
            .get(),
        10.0
    );
    assert_eq!(metrics.parse_error_counter.get(), 0.0);
    assert_eq!(metrics.connection_error_counter.get(), 0.0);
}

#[tokio::test]
async fn malformed_body_counts_as_parse_error() {
    let addr = spawn_controller("not json at all").await;

    let metrics = VolumeMetrics::new().unwrap();
    let collector = VolumeCollector::new(
        Box::new(JivaSource::new(&format!("http://{}", addr)).unwrap()),
        metrics.clone(),
    );
    collector.collect().await;

    assert_eq!(metrics.parse_error_counter.get(), 1.0);
    // the zero snapshot still lands
    assert_eq!(metrics.size_of_volume.get(), 0.0);
    assert_eq!(metrics.volume_status.get(), 4.0);
}

#[tokio::test]
async fn unreachable_controller_counts_as_connection_error() {
    // 127.0.0.1:9 is the discard port; nothing listens there in CI
    let metrics = VolumeMetrics::new().unwrap();
    let collector = VolumeCollector::new(
        Box::new(JivaSource::new("http://127.0.0.1:9").unwrap()),
        metrics.clone(),
    );
    collector.collect().await;

    assert_eq!(metrics.connection_error_counter.get(), 1.0);
    assert_eq!(metrics.connection_retry_counter.get(), 1.0);
    assert_eq!(metrics.size_of_volume.get(), 0.0);
}

#[tokio::test]
async fn overlapping_scrapes_hit_the_reject_counter() {
    // Given: a controller that takes 200ms to answer
    let router = Router::new().route(
        "/v1/stats",
        get(|| async {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            STATS_BODY
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let metrics = VolumeMetrics::new().unwrap();
    let collector = Arc::new(VolumeCollector::new(
        Box::new(JivaSource::new(&format!("http://{}", addr)).unwrap()),
        metrics.clone(),
    ));
    tokio::join!(collector.collect(), collector.collect(), collector.collect());

    assert_eq!(metrics.reject_request_counter.get(), 2);
    assert_eq!(metrics.reads.get(), 120.0);
}
