//! Tests for subprocess timeout behaviour and scrape admission.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use openebs_exporter::collectors::{Collector, PoolSyncCollector};
use openebs_exporter::error::Result;
use openebs_exporter::metrics::PoolSyncMetrics;
use openebs_exporter::source::runner::{CommandRunner, Runner};

#[tokio::test]
async fn slow_child_is_killed_at_the_deadline() {
    // Given: a 200ms budget and a child that sleeps far longer
    let runner = CommandRunner::with_timeout(Duration::from_millis(200));

    // When: the command runs
    let started = Instant::now();
    let err = runner.run("sleep", &["5"]).await.unwrap_err();

    // Then: the error surfaces well within budget + 1s
    assert!(err.to_string().contains("timed out"), "{}", err);
    assert!(
        started.elapsed() < Duration::from_millis(1200),
        "took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn nonzero_exit_is_a_command_error() {
    let runner = CommandRunner::new();
    let err = runner.run("false", &[]).await.unwrap_err();
    assert!(err.to_string().contains("command error"), "{}", err);
}

#[tokio::test]
async fn combined_output_includes_stdout() {
    let runner = CommandRunner::new();
    let out = runner.run("echo", &["no pools available"]).await.unwrap();
    assert!(out.contains("no pools available"));
}

/// Runner that holds every call open long enough for overlapping scrapes to
/// pile up behind the admission gate.
struct SlowRunner;

#[async_trait]
impl Runner for SlowRunner {
    async fn run(&self, _: &str, _: &[&str]) -> Result<String> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok("cstor-a  io.openebs:livenesstimestamp  1550214414  local\n".to_string())
    }
}

#[tokio::test]
async fn overlapping_liveness_scrapes_admit_exactly_one() {
    // Given: five scrapes arriving within one command duration
    let metrics = PoolSyncMetrics::new().unwrap();
    let collector = PoolSyncCollector::new(Arc::new(SlowRunner), metrics.clone());

    // When: they run concurrently
    tokio::join!(
        collector.collect(),
        collector.collect(),
        collector.collect(),
        collector.collect(),
        collector.collect(),
    );

    // Then: one scrape wrote the gauges, the other four only the reject
    // counter
    assert_eq!(metrics.reject_request_counter.get(), 4.0);
    assert_eq!(
        metrics.last_sync_time.with_label_values(&["cstor-a"]).get(),
        1550214414.0
    );

    // And: with the gate released, the next scrape is admitted again
    collector.collect().await;
    assert_eq!(metrics.reject_request_counter.get(), 4.0);
}
