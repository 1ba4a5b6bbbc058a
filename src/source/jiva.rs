//! HTTP/JSON volume source for the jiva engine.
//!
//! The jiva controller serves volume statistics as JSON at `/v1/stats`. One
//! GET per scrape, with a short per-request deadline so a stuck controller
//! cannot hold the scrape open.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ExporterError, Result};
use crate::metrics::VolumeMetrics;
use crate::source::types::{VolumeRecord, VolumeStats};
use crate::source::VolumeSource;

const STATS_PATH: &str = "/v1/stats";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Volume source backed by the jiva controller REST endpoint.
pub struct JivaSource {
    url: String,
    /// Target address shown to consumers: the controller URL with scheme and
    /// the well-known port/path stripped.
    address: String,
    client: reqwest::Client,
}

impl JivaSource {
    pub fn new(controller_addr: &str) -> Result<Self> {
        let url = format!("{}{}", controller_addr.trim_end_matches('/'), STATS_PATH);
        let address = url
            .trim_start_matches("http://")
            .trim_end_matches(":9501/v1/stats")
            .to_string();
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ExporterError::Connection(err.to_string()))?;
        Ok(Self {
            url,
            address,
            client,
        })
    }
}

#[async_trait]
impl VolumeSource for JivaSource {
    fn cas_type(&self) -> &'static str {
        "jiva"
    }

    async fn get(&self, metrics: &VolumeMetrics) -> Result<VolumeStats> {
        let response = self.client.get(&self.url).send().await.map_err(|err| {
            metrics.connection_retry_counter.inc();
            metrics.connection_error_counter.inc();
            ExporterError::Connection(format!("failed to reach {}: {}", self.url, err))
        })?;
        let mut stats: VolumeStats = response.json().await.map_err(|err| {
            metrics.parse_error_counter.inc();
            ExporterError::Parse(format!("failed to decode stats from {}: {}", self.url, err))
        })?;
        stats.got = true;
        Ok(stats)
    }

    fn parse(&self, stats: &VolumeStats, metrics: &VolumeMetrics) -> VolumeRecord {
        let mut rec = stats.to_record(metrics);
        rec.cas_type = self.cas_type().to_string();
        rec.name = stats.name.clone();
        rec.iqn = format!("iqn.2016-09.com.openebs.jiva:{}", stats.name);
        rec.address = self.address.clone();
        rec
    }
}
