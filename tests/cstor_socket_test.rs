//! Tests for the istgt control-socket adapter against a fake target.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use openebs_exporter::collectors::{ScrapeRegistry, VolumeCollector};
use openebs_exporter::exposition;
use openebs_exporter::metrics::VolumeMetrics;
use openebs_exporter::source::cstor::CstorSource;
use openebs_exporter::source::VolumeSource;

const BANNER: &[u8] = b"iSCSI Target Controller version 0.5.20121028 (2016/215)\r\n";

const IOSTATS_JSON: &str = r#"{ "iqn": "iqn.2017-08.OpenEBS.cstor:vol1", "WriteIOPS": "0", "ReadIOPS": "0", "TotalWriteBytes": "0", "TotalReadBytes": "0", "Size": "10737418240", "UsedLogicalBlocks": "19", "SectorSize": "512", "UpTime": "20", "TotalReadBlockCount": "12", "TotalWriteBlockCount": "15", "TotalReadTime": "13", "TotalWriteTime": "132", "RevisionCounter": "1000", "ReplicaCounter": "3", "Replicas": [ {"Address":"tcp://172.18.0.3:9502","Mode":"Degraded"}, {"Address":"tcp://172.18.0.4:9502","Mode":"Healthy"}, {"Address":"tcp://172.18.0.5:9502","Mode":"Healthy"}] }"#;

fn socket_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "openebs-exporter-{}-{}.sock",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}

fn framed_response() -> Vec<u8> {
    format!("IOSTATS  {}\r\nOK IOSTATS\r\n", IOSTATS_JSON).into_bytes()
}

async fn serve_one(mut stream: UnixStream, response: &[u8]) {
    stream.write_all(BANNER).await.unwrap();
    let mut buf = [0u8; 64];
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"IOSTATS\n");
    stream.write_all(response).await.unwrap();
}

#[tokio::test]
async fn happy_path_renders_volume_gauges() {
    // Given: a fake target serving one complete IOSTATS exchange per
    // connection
    let path = socket_path("happy");
    let listener = UnixListener::bind(&path).unwrap();
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            serve_one(stream, &framed_response()).await;
        }
    });

    // When: one scrape runs through the registry
    let metrics = VolumeMetrics::new().unwrap();
    let mut registry = ScrapeRegistry::new();
    metrics.register_on(registry.registry()).unwrap();
    registry.register(Arc::new(VolumeCollector::new(
        Box::new(CstorSource::new(&path)),
        metrics.clone(),
    )));
    let body = exposition::render_text(&registry.gather().await).unwrap();

    // Then: the rendered exposition carries the derived values
    assert!(body.contains("openebs_reads 0"));
    assert!(body.contains("openebs_size_of_volume 10"));
    assert!(body.contains("openebs_read_block_count 12"));
    assert!(body.contains("openebs_write_time 132"));
    assert!(body.contains("openebs_total_replica_count 3"));
    assert!(body.contains("openebs_healthy_replica_count 2"));
    assert!(body.contains("openebs_degraded_replica_count 1"));
    assert!(body.contains("openebs_volume_status 2"));
    assert!(body.contains("volName=\"vol1\""));
    assert_eq!(metrics.parse_error_counter.get(), 0.0);
}

#[tokio::test]
async fn unreachable_socket_yields_zero_snapshot() {
    // Given: no target listening on the socket path
    let path = socket_path("unreachable");

    let metrics = VolumeMetrics::new().unwrap();
    let mut registry = ScrapeRegistry::new();
    metrics.register_on(registry.registry()).unwrap();
    registry.register(Arc::new(VolumeCollector::new(
        Box::new(CstorSource::new(&path)),
        metrics.clone(),
    )));

    // When: one scrape runs
    let body = exposition::render_text(&registry.gather().await).unwrap();

    // Then: gauges are zero and the error counters record the outage
    assert!(body.contains("openebs_size_of_volume 0"));
    assert!(body.contains("openebs_connection_error_total 1"));
    assert_eq!(metrics.connection_retry_counter.get(), 1.0);
}

#[tokio::test]
async fn command_is_held_until_the_banner_completes() {
    // Given: a target that drips the banner out in three chunks
    let path = socket_path("banner-gate");
    let listener = UnixListener::bind(&path).unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        for chunk in [&BANNER[..10], &BANNER[10..30], &BANNER[30..]] {
            if chunk != &BANNER[30..] {
                stream.write_all(chunk).await.unwrap();
                tokio::time::sleep(Duration::from_millis(100)).await;
                // The client must not have sent anything yet: the banner is
                // still incomplete.
                let mut peek = [0u8; 16];
                match stream.try_read(&mut peek) {
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                    other => panic!("client wrote before banner completed: {:?}", other),
                }
            } else {
                stream.write_all(chunk).await.unwrap();
            }
        }
        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"IOSTATS\n");
        stream.write_all(&framed_response()).await.unwrap();
    });

    let metrics = VolumeMetrics::new().unwrap();
    let source = CstorSource::new(&path);

    // When/Then: the exchange still succeeds
    let stats = source.get(&metrics).await.unwrap();
    assert_eq!(stats.iqn, "iqn.2017-08.OpenEBS.cstor:vol1");
}

#[tokio::test]
async fn missing_framer_keeps_the_read_open() {
    // Given: a target that answers without the "OK IOSTATS" trailer and
    // keeps the connection open
    let path = socket_path("no-framer");
    let listener = UnixListener::bind(&path).unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.write_all(BANNER).await.unwrap();
        let mut buf = [0u8; 64];
        stream.read(&mut buf).await.unwrap();
        stream
            .write_all(b"IOSTATS  {\"iqn\":\"x\"}\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let metrics = VolumeMetrics::new().unwrap();
    let source = CstorSource::new(&path);

    // When/Then: get() does not terminate on its own
    let outcome = tokio::time::timeout(Duration::from_millis(300), source.get(&metrics)).await;
    assert!(outcome.is_err(), "read terminated without the framer");
}

#[tokio::test]
async fn io_error_triggers_reconnect_on_the_next_scrape() {
    // Given: a target that closes the connection after each exchange
    let path = socket_path("reconnect");
    let listener = UnixListener::bind(&path).unwrap();
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            serve_one(stream, &framed_response()).await;
            // connection dropped here
        }
    });

    let metrics = VolumeMetrics::new().unwrap();
    let source = CstorSource::new(&path);

    // First scrape connects and succeeds.
    source.get(&metrics).await.unwrap();
    assert_eq!(metrics.connection_retry_counter.get(), 1.0);

    // Second scrape hits the closed socket; the handle is zeroed.
    let err = source.get(&metrics).await.unwrap_err();
    assert!(err.to_string().contains("connection"), "{}", err);
    assert_eq!(metrics.connection_error_counter.get(), 1.0);

    // Third scrape dials a fresh connection rather than reusing the dead
    // handle.
    source.get(&metrics).await.unwrap();
    assert_eq!(metrics.connection_retry_counter.get(), 2.0);
}
