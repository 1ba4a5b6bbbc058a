//! Per-volume collector for the jiva and cstor engines.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::error;

use crate::collectors::Collector;
use crate::metrics::VolumeMetrics;
use crate::source::types::VolumeRecord;
use crate::source::VolumeSource;

/// Refreshes the per-volume gauges from a [`VolumeSource`] on every scrape.
///
/// Scrapes are admitted one at a time: an overlapping scrape only bumps the
/// reject counter, so a stalled target cannot queue requests behind itself.
pub struct VolumeCollector {
    source: Box<dyn VolumeSource>,
    metrics: VolumeMetrics,
    in_flight: Mutex<bool>,
}

impl VolumeCollector {
    pub fn new(source: Box<dyn VolumeSource>, metrics: VolumeMetrics) -> Self {
        Self {
            source,
            metrics,
            in_flight: Mutex::new(false),
        }
    }
}

#[async_trait]
impl Collector for VolumeCollector {
    fn name(&self) -> &'static str {
        "volume"
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

        let rec = match self.source.get(&self.metrics).await {
            Ok(stats) => self.source.parse(&stats, &self.metrics),
            Err(err) => {
                // Counters were bumped by the adapter; write a zero-valued
                // snapshot so consumers see the outage rather than stale I/O
                // figures.
                error!("failed to fetch {} stats: {}", self.source.cas_type(), err);
                VolumeRecord {
                    cas_type: self.source.cas_type().to_string(),
                    ..VolumeRecord::default()
                }
            }
        };
        self.metrics.set(&rec);

        *self.in_flight.lock().await = false;
    }
}
