//! Per-dataset I/O and rebuild collector (`zfs stats`).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::error;

use crate::collectors::Collector;
use crate::metrics::ZvolStatsMetrics;
use crate::source::runner::Runner;
use crate::source::types::ZvolStats;

/// Refreshes the `{vol, pool}` labeled I/O and rebuild gauges from the JSON
/// printed by `zfs stats`.
pub struct ZvolStatsCollector {
    runner: Arc<dyn Runner>,
    metrics: ZvolStatsMetrics,
    in_flight: Mutex<bool>,
}

impl ZvolStatsCollector {
    pub fn new(runner: Arc<dyn Runner>, metrics: ZvolStatsMetrics) -> Self {
        Self {
            runner,
            metrics,
            in_flight: Mutex::new(false),
        }
    }

    fn apply(&self, stats: &ZvolStats) {
        if stats.volumes.is_empty() || stats.volumes.iter().any(|s| s.name.is_empty()) {
            error!("empty pool/volume name in zfs stats output");
            self.metrics.command_error_counter.inc();
            return;
        }
        for stat in &stats.volumes {
            let (pool, vol) = stat.split_name();
            self.metrics.set(pool, vol, stat);
        }
    }
}

#[async_trait]
impl Collector for ZvolStatsCollector {
    fn name(&self) -> &'static str {
        "zfs_stats"
    }

    async fn collect(&self) {
        {
            let mut in_flight = self.in_flight.lock().await;
            if *in_flight {
                self.metrics.reject_request_counter.inc();
                return;
            }
            *in_flight = true;
        }

        match self.runner.run("zfs", &["stats"]).await {
            Ok(output) => match serde_json::from_str::<ZvolStats>(&output) {
                Ok(stats) => self.apply(&stats),
                Err(err) => {
                    error!("failed to decode zfs stats output: {}", err);
                    self.metrics.parse_error_counter.inc();
                }
            },
            Err(err) => {
                error!("zfs stats failed: {}", err);
                self.metrics.command_error_counter.inc();
            }
        }

        *self.in_flight.lock().await = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRunner(&'static str);

    #[async_trait]
    impl Runner for FixedRunner {
        async fn run(&self, _: &str, _: &[&str]) -> crate::error::Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn collector(output: &'static str) -> ZvolStatsCollector {
        ZvolStatsCollector::new(Arc::new(FixedRunner(output)), ZvolStatsMetrics::new().unwrap())
    }

    #[tokio::test]
    async fn rebuilding_dataset_sets_status_gauges() {
        let c = collector(
            r#"{"stats":[{"name":"cstor-5ce4639a-2dc1-11e9-bbe3-42010a80017a/pvc-1c1698bb-2dc6-11e9-bbe3-42010a80017a","status":"Rebuilding","rebuildStatus":"SNAP REBUILD INPROGRESS","readCount":1000,"readByte":1024,"writeCount":1000,"writeByte":1024,"syncCount":100,"syncLatency":10,"readLatency":150,"writeLatency":200,"inflightIOCnt":2000,"dispatchedIOCnt":50,"rebuildCnt":3,"rebuildBytes":500,"rebuildDoneCnt":2,"rebuildFailedCnt":0}]}"#,
        );
        c.collect().await;
        let labels = &[
            "pvc-1c1698bb-2dc6-11e9-bbe3-42010a80017a",
            "cstor-5ce4639a-2dc1-11e9-bbe3-42010a80017a",
        ];
        assert_eq!(c.metrics.replica_status.with_label_values(labels).get(), 3.0);
        assert_eq!(c.metrics.rebuild_status.with_label_values(labels).get(), 2.0);
        assert_eq!(c.metrics.read_count.with_label_values(labels).get(), 1000.0);
        assert_eq!(c.metrics.read_bytes.with_label_values(labels).get(), 1024.0);
        assert_eq!(c.metrics.sync_latency.with_label_values(labels).get(), 10.0);
        assert_eq!(
            c.metrics.inflight_io_count.with_label_values(labels).get(),
            2000.0
        );
        assert_eq!(c.metrics.command_error_counter.get(), 0.0);
    }

    #[tokio::test]
    async fn empty_stats_list_counts_as_command_error() {
        let c = collector(r#"{"stats":[]}"#);
        c.collect().await;
        assert_eq!(c.metrics.command_error_counter.get(), 1.0);
    }

    #[tokio::test]
    async fn unnamed_dataset_counts_as_command_error() {
        let c = collector(r#"{"stats":[{"name":"","status":"Healthy"}]}"#);
        c.collect().await;
        assert_eq!(c.metrics.command_error_counter.get(), 1.0);
    }

    #[tokio::test]
    async fn malformed_json_counts_as_parse_error() {
        let c = collector("not json");
        c.collect().await;
        assert_eq!(c.metrics.parse_error_counter.get(), 1.0);
        assert_eq!(c.metrics.command_error_counter.get(), 0.0);
    }
}
