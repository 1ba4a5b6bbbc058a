//! Pool liveness collector (`zfs get io.openebs:livenesstimestamp`).
//!
//! The replica process refreshes the `io.openebs:livenesstimestamp` property
//! on its pool; reading it back tells whether the pool is still synced. The
//! probe runs under a tight one-second budget and refuses overlapping
//! scrapes outright, trading completeness for bounded latency.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::collectors::pool::NO_POOLS_SENTINEL;
use crate::collectors::Collector;
use crate::metrics::PoolSyncMetrics;
use crate::source::runner::Runner;

const NO_DATASET_SENTINEL: &str = "no dataset available";
const LIVENESS_PROPERTY: &str = "io.openebs:livenesstimestamp";

/// Refreshes `zpool_last_sync_time{pool}` and its companions.
pub struct PoolSyncCollector {
    runner: Arc<dyn Runner>,
    metrics: PoolSyncMetrics,
    in_flight: Mutex<bool>,
}

impl PoolSyncCollector {
    pub fn new(runner: Arc<dyn Runner>, metrics: PoolSyncMetrics) -> Self {
        Self {
            runner,
            metrics,
            in_flight: Mutex::new(false),
        }
    }

    /// The pool cannot be identified: publish the fallback entity under the
    /// hostname label so the outage is visible without inventing a pool.
    fn set_fallback(&self) {
        let name = crate::collectors::hostname_fallback();
        let name = name.as_str();
        self.metrics.last_sync_time.with_label_values(&[name]).set(0.0);
        self.metrics.state_unknown.with_label_values(&[name]).set(1.0);
        self.metrics
            .sync_time_command_error
            .with_label_values(&[name])
            .set(0.0);
    }

    fn apply(&self, output: &str) {
        if output.contains(NO_DATASET_SENTINEL) || output.contains(NO_POOLS_SENTINEL) {
            self.set_fallback();
            return;
        }
        // Expected table: `<pool> <property> <value> <source>`.
        let Some(line) = output.lines().find(|l| !l.trim().is_empty()) else {
            // Nothing printed at all reads the same as a missing dataset.
            self.set_fallback();
            return;
        };
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            // Transient truncation; leave the gauges alone.
            return;
        }
        let pool = fields[0];
        let value = fields[2];
        match value.parse::<f64>() {
            Ok(timestamp) => {
                self.metrics
                    .last_sync_time
                    .with_label_values(&[pool])
                    .set(timestamp);
                self.metrics.state_unknown.with_label_values(&[pool]).set(0.0);
                self.metrics
                    .sync_time_command_error
                    .with_label_values(&[pool])
                    .set(0.0);
            }
            Err(err) => {
                // The property is unset ("-") until the replica's first sync.
                warn!("liveness timestamp {:?} not numeric: {}", value, err);
                self.metrics.last_sync_time.with_label_values(&[pool]).set(0.0);
                self.metrics.state_unknown.with_label_values(&[pool]).set(1.0);
            }
        }
    }
}

#[async_trait]
impl Collector for PoolSyncCollector {
    fn name(&self) -> &'static str {
        "pool_sync"
    }

    async fn collect(&self) {
        {
            let mut in_flight = self.in_flight.lock().await;
            if *in_flight {
                // Rejected scrapes touch nothing but this counter.
                self.metrics.reject_request_counter.inc();
                return;
            }
            *in_flight = true;
        }

        match self.runner.run("zfs", &["get", LIVENESS_PROPERTY]).await {
            Ok(output) => self.apply(&output),
            Err(err) => {
                error!("zfs get {} failed: {}", LIVENESS_PROPERTY, err);
                self.metrics
                    .sync_time_command_error
                    .with_label_values(&[crate::collectors::hostname_fallback().as_str()])
                    .set(1.0);
            }
        }

        *self.in_flight.lock().await = false;
    }
}
