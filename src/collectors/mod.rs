//! Collectors and the scrape registry.
//!
//! Collectors follow a consistent pattern:
//! - own the metric group they write (one writer per gauge);
//! - fetch fresh raw data through a source adapter on every scrape;
//! - absorb failures: errors bump the group's error counters and are never
//!   propagated to the HTTP handler — the scrape always renders 200.
//!
//! The [`ScrapeRegistry`] drives them: each scrape awaits every collector in
//! registration order, then gathers the underlying registry.

use std::sync::Arc;

use async_trait::async_trait;
use prometheus::proto::MetricFamily;
use prometheus::Registry;
use tracing::debug;

pub mod pool;
pub mod pool_sync;
pub mod volume;
pub mod zvol_list;
pub mod zvol_stats;

pub use pool::PoolCollector;
pub use pool_sync::PoolSyncCollector;
pub use volume::VolumeCollector;
pub use zvol_list::ZvolListCollector;
pub use zvol_stats::ZvolStatsCollector;

/// Pool label used when the command output cannot identify a pool. Sidecar
/// pods carry the pool identity in their hostname.
pub(crate) fn hostname_fallback() -> String {
    std::env::var("HOSTNAME").unwrap_or_default()
}

/// A set of gauges plus the knowledge of how to refresh them.
#[async_trait]
pub trait Collector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Refreshes the collector's gauges. Must be safe under concurrent
    /// entry: scrapes may overlap, and a collector that cannot tolerate
    /// that guards itself with an admission gate.
    async fn collect(&self);
}

/// Holds the registered collectors and the prometheus registry they write
/// into. Collection happens per scrape (pull model); between scrapes the
/// gauges keep their last values.
pub struct ScrapeRegistry {
    registry: Registry,
    collectors: Vec<Arc<dyn Collector>>,
}

impl ScrapeRegistry {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            collectors: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn register(&mut self, collector: Arc<dyn Collector>) {
        self.collectors.push(collector);
    }

    /// Runs one collection pass and returns the gathered metric families.
    pub async fn gather(&self) -> Vec<MetricFamily> {
        for collector in &self.collectors {
            debug!("collecting {}", collector.name());
            collector.collect().await;
        }
        self.registry.gather()
    }
}

impl Default for ScrapeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
