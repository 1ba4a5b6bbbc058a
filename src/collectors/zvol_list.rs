//! Per-dataset capacity collector (`zfs list -Hp`).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::error;

use crate::collectors::Collector;
use crate::metrics::ZvolListMetrics;
use crate::source::runner::Runner;

/// Refreshes `used_size{name}` and `available_size{name}` from the rows of
/// `zfs list -Hp`.
pub struct ZvolListCollector {
    runner: Arc<dyn Runner>,
    metrics: ZvolListMetrics,
    in_flight: Mutex<bool>,
}

impl ZvolListCollector {
    pub fn new(runner: Arc<dyn Runner>, metrics: ZvolListMetrics) -> Self {
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
                error!("failed to parse zfs list field {:?}: {}", raw, err);
                self.metrics.parse_error_counter.inc();
                0.0
            }
        }
    }

    fn parse_rows(&self, output: &str) {
        if output.trim().is_empty() {
            self.metrics.parse_error_counter.inc();
            return;
        }
        for line in output.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            // A short row marks the end of the table, not an error.
            if fields.len() < 3 {
                break;
            }
            self.metrics
                .used_size
                .with_label_values(&[fields[0]])
                .set(self.parse_field(fields[1]));
            self.metrics
                .available_size
                .with_label_values(&[fields[0]])
                .set(self.parse_field(fields[2]));
        }
    }
}

#[async_trait]
impl Collector for ZvolListCollector {
    fn name(&self) -> &'static str {
        "zfs_list"
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

        match self.runner.run("zfs", &["list", "-Hp"]).await {
            Ok(output) => self.parse_rows(&output),
            Err(err) => {
                error!("zfs list failed: {}", err);
                self.metrics.command_error_counter.inc();
            }
        }

        *self.in_flight.lock().await = false;
    }
}
