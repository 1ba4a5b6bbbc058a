//! Source adapters: where raw statistics come from.
//!
//! Volume statistics arrive over HTTP/JSON (jiva) or a UNIX-socket line
//! protocol (cstor); pool and dataset statistics come from `zpool`/`zfs`
//! child processes run through the [`runner::Runner`] abstraction.

pub mod cstor;
pub mod jiva;
pub mod runner;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use crate::metrics::VolumeMetrics;
use types::{VolumeRecord, VolumeStats};

/// The contract both volume adapters satisfy: fetch one raw snapshot, then
/// derive the canonical per-scrape record from it.
#[async_trait]
pub trait VolumeSource: Send + Sync {
    fn cas_type(&self) -> &'static str;

    /// Obtains one snapshot. Connection and decode failures bump the
    /// matching error counters before the error is returned.
    async fn get(&self, metrics: &VolumeMetrics) -> Result<VolumeStats>;

    /// Derives the record the metric translator consumes, filling in the
    /// engine-specific identity fields.
    fn parse(&self, stats: &VolumeStats, metrics: &VolumeMetrics) -> VolumeRecord;
}
