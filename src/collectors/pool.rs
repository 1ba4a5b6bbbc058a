//! Pool capacity and status collector (`zpool list -Hp`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use prometheus::Gauge;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::collectors::Collector;
use crate::metrics::PoolMetrics;
use crate::source::runner::Runner;
use crate::source::types::PoolStatus;

pub(crate) const NO_POOLS_SENTINEL: &str = "no pools available";

/// `zpool list -Hp` prints positional fields
/// `name size used free ckpoint expandsz cap dedup health altroot`;
/// a usable row carries at least the first nine.
const MIN_FIELDS: usize = 9;

/// Refreshes pool size, capacity and status gauges from `zpool list -Hp`.
pub struct PoolCollector {
    runner: Arc<dyn Runner>,
    metrics: PoolMetrics,
    in_flight: Mutex<bool>,
}

impl PoolCollector {
    pub fn new(runner: Arc<dyn Runner>, metrics: PoolMetrics) -> Self {
        Self {
            runner,
            metrics,
            in_flight: Mutex::new(false),
        }
    }

    fn parse_field(&self, raw: &str) -> f64 {
        match raw.parse::<f64>() {
            Ok(v) => v,
            Err(err) => {
                error!("failed to parse zpool field {:?}: {}", raw, err);
                self.metrics.parse_error_counter.inc();
                0.0
            }
        }
    }

    fn parse_rows(&self, output: &str) {
        for line in output.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() < MIN_FIELDS {
                warn!("incomplete zpool list row: {:?}", line);
                self.metrics.incomplete_stdout_counter.inc();
                continue;
            }
            let status = match PoolStatus::parse(fields[8]) {
                Some(status) => status,
                None => {
                    error!("unknown pool status {:?}", fields[8]);
                    self.metrics.parse_error_counter.inc();
                    continue;
                }
            };
            self.metrics.set(
                fields[0],
                self.parse_field(fields[1]),
                self.parse_field(fields[2]),
                self.parse_field(fields[3]),
                self.parse_field(fields[6]),
                status,
            );
        }
    }
}

#[async_trait]
impl Collector for PoolCollector {
    fn name(&self) -> &'static str {
        "zpool_list"
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

        match self.runner.run("zpool", &["list", "-Hp"]).await {
            Ok(output) if output.contains(NO_POOLS_SENTINEL) => {
                // Status 6 replaces the capacity gauges, never joins them.
                self.metrics.no_pool_available_counter.inc();
                self.metrics
                    .status
                    .with_label_values(&[crate::collectors::hostname_fallback().as_str()])
                    .set(PoolStatus::NoPoolsAvailable.code() as f64);
            }
            Ok(output) => self.parse_rows(&output),
            Err(err) => {
                error!("zpool list failed: {}", err);
                self.metrics.command_error_counter.inc();
            }
        }

        *self.in_flight.lock().await = false;
    }
}

/// Blocks until `zpool status` reports at least one pool. Unbounded on
/// purpose: the sidecar must stay alive waiting for its sibling storage
/// container to come up.
pub async fn wait_for_pools(runner: &dyn Runner, command_error_counter: &Gauge) {
    loop {
        match runner.run("zpool", &["status"]).await {
            Ok(output) if !output.contains(NO_POOLS_SENTINEL) => {
                info!("storage pool is available");
                return;
            }
            Ok(_) => {
                warn!("no storage pool available yet, retrying");
                tokio::time::sleep(Duration::from_secs(3)).await;
            }
            Err(err) => {
                warn!("zpool status failed: {}, retrying", err);
                command_error_counter.inc();
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
