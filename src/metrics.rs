//! Prometheus metric definitions
//!
//! This module owns the canonical `openebs_` metric catalogue. Metric names
//! are a wire contract with existing dashboards; renaming one is an
//! external-interface break.
//!
//! Metrics are grouped by the collector that writes them:
//!
//! - [`VolumeMetrics`] - per-volume I/O counters, capacity and status
//! - [`PoolMetrics`] - `zpool list` capacity and status
//! - [`ZvolStatsMetrics`] - per-dataset I/O and rebuild statistics
//! - [`ZvolListMetrics`] - per-dataset used/available capacity
//! - [`PoolSyncMetrics`] - pool liveness timestamps
//!
//! Each group registers on a shared [`Registry`] and exposes setter methods
//! that accept the parsed records. A gauge has exactly one writer (its owning
//! collector); the registry and the exposition server only read.

use prometheus::{Gauge, GaugeVec, IntCounter, Opts, Registry};

use crate::source::types::{PoolStatus, VolumeRecord, ZvolStat};

/// Divisor for byte-to-gibibyte conversions.
pub const BYTES_TO_GB: f64 = 1_073_741_824.0;

/// Divisor for byte-to-mebibyte conversions. Off by 9 from 2^20; kept
/// bit-for-bit as consumers already compensate for it.
pub const BYTES_TO_MB: f64 = 1_048_567.0;

/// Divisor for microsecond-to-second latency conversions.
pub const MICROSECONDS_TO_SECONDS: f64 = 1_000_000.0;

pub fn bytes_to_gb(bytes: f64) -> f64 {
    bytes / BYTES_TO_GB
}

pub fn bytes_to_mb(bytes: f64) -> f64 {
    bytes / BYTES_TO_MB
}

fn gauge(name: &str, help: &str) -> prometheus::Result<Gauge> {
    Gauge::with_opts(Opts::new(name, help).namespace("openebs"))
}

fn gauge_vec(name: &str, help: &str, labels: &[&str]) -> prometheus::Result<GaugeVec> {
    GaugeVec::new(Opts::new(name, help).namespace("openebs"), labels)
}

/// Per-volume metrics written by the jiva/cstor volume collector.
#[derive(Clone)]
pub struct VolumeMetrics {
    pub actual_used: Gauge,
    pub logical_size: Gauge,
    pub sector_size: Gauge,
    pub reads: Gauge,
    pub writes: Gauge,
    pub total_read_bytes: Gauge,
    pub total_write_bytes: Gauge,
    pub read_time: Gauge,
    pub write_time: Gauge,
    pub read_block_count: Gauge,
    pub write_block_count: Gauge,
    pub size_of_volume: Gauge,
    pub volume_status: Gauge,
    pub connection_retry_counter: Gauge,
    pub connection_error_counter: Gauge,
    pub parse_error_counter: Gauge,
    pub total_replica_counter: Gauge,
    pub healthy_replica_counter: Gauge,
    pub degraded_replica_counter: Gauge,
    pub is_client_connected: Gauge,
    pub volume_uptime: GaugeVec,
    pub reject_request_counter: IntCounter,
}

impl VolumeMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            actual_used: gauge("actual_used", "Actual volume size used")?,
            logical_size: gauge("logical_size", "Logical size of volume")?,
            sector_size: gauge("sector_size", "sector size of volume")?,
            reads: gauge("reads", "Read Input/Outputs on Volume")?,
            writes: gauge("writes", "Write Input/Outputs on Volume")?,
            total_read_bytes: gauge("total_read_bytes", "Total read bytes")?,
            total_write_bytes: gauge("total_write_bytes", "Total write bytes")?,
            read_time: gauge("read_time", "Read time on volume")?,
            write_time: gauge("write_time", "Write time on volume")?,
            read_block_count: gauge("read_block_count", "Read Block count of volume")?,
            write_block_count: gauge("write_block_count", "Write Block count of volume")?,
            size_of_volume: gauge("size_of_volume", "Size of the volume requested")?,
            volume_status: gauge(
                "volume_status",
                "Status of volume: (1, 2, 3, 4) = {Offline, Degraded, Healthy, Unknown}",
            )?,
            connection_retry_counter: gauge(
                "connection_retry_total",
                "Total no of connection retry requests",
            )?,
            connection_error_counter: gauge(
                "connection_error_total",
                "Total no of connection errors",
            )?,
            parse_error_counter: gauge("parse_error_total", "Total no of parsing errors")?,
            total_replica_counter: gauge(
                "total_replica_count",
                "Total no of replicas connected to cas",
            )?,
            healthy_replica_counter: gauge(
                "healthy_replica_count",
                "Total no of healthy replicas",
            )?,
            degraded_replica_counter: gauge(
                "degraded_replica_count",
                "Total no of degraded/ro replicas",
            )?,
            is_client_connected: gauge(
                "iscsi_initiator_login_status",
                "iSCSI Initiator to target login status: (0, 1) = {Not Logged In, Logged In}",
            )?,
            volume_uptime: gauge_vec(
                "volume_uptime",
                "Time since volume has registered",
                &["volName", "castype"],
            )?,
            reject_request_counter: IntCounter::with_opts(
                Opts::new(
                    "target_reject_request_counter",
                    "Total no of rejected scrape requests if a request is already in progress",
                )
                .namespace("openebs"),
            )?,
        })
    }

    pub fn register_on(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.actual_used.clone()))?;
        registry.register(Box::new(self.logical_size.clone()))?;
        registry.register(Box::new(self.sector_size.clone()))?;
        registry.register(Box::new(self.reads.clone()))?;
        registry.register(Box::new(self.writes.clone()))?;
        registry.register(Box::new(self.total_read_bytes.clone()))?;
        registry.register(Box::new(self.total_write_bytes.clone()))?;
        registry.register(Box::new(self.read_time.clone()))?;
        registry.register(Box::new(self.write_time.clone()))?;
        registry.register(Box::new(self.read_block_count.clone()))?;
        registry.register(Box::new(self.write_block_count.clone()))?;
        registry.register(Box::new(self.size_of_volume.clone()))?;
        registry.register(Box::new(self.volume_status.clone()))?;
        registry.register(Box::new(self.connection_retry_counter.clone()))?;
        registry.register(Box::new(self.connection_error_counter.clone()))?;
        registry.register(Box::new(self.parse_error_counter.clone()))?;
        registry.register(Box::new(self.total_replica_counter.clone()))?;
        registry.register(Box::new(self.healthy_replica_counter.clone()))?;
        registry.register(Box::new(self.degraded_replica_counter.clone()))?;
        registry.register(Box::new(self.is_client_connected.clone()))?;
        registry.register(Box::new(self.volume_uptime.clone()))?;
        registry.register(Box::new(self.reject_request_counter.clone()))?;
        Ok(())
    }

    /// Writes one complete snapshot. Called once per scrape with either a
    /// fresh record or an all-zero record (source unreachable); there is no
    /// partial update.
    pub fn set(&self, rec: &VolumeRecord) {
        self.reads.set(rec.reads);
        self.writes.set(rec.writes);
        self.total_read_bytes.set(rec.total_read_bytes);
        self.total_write_bytes.set(rec.total_write_bytes);
        self.read_time.set(rec.total_read_time);
        self.write_time.set(rec.total_write_time);
        self.read_block_count.set(rec.total_read_block_count);
        self.write_block_count.set(rec.total_write_block_count);
        self.sector_size.set(rec.sector_size);
        self.logical_size.set(rec.logical_size);
        self.actual_used.set(rec.actual_used);
        self.size_of_volume.set(rec.size);
        self.volume_uptime
            .with_label_values(&[rec.name.as_str(), rec.cas_type.as_str()])
            .set(rec.uptime);
        self.total_replica_counter.set(rec.total_replica_count);
        self.healthy_replica_counter.set(rec.healthy_replica_count);
        self.degraded_replica_counter.set(rec.degraded_replica_count);
        self.volume_status.set(rec.status.code() as f64);
        self.is_client_connected.set(rec.is_client_connected);
    }
}

/// Pool-level metrics written by the `zpool list` collector.
#[derive(Clone)]
pub struct PoolMetrics {
    pub size: Gauge,
    pub used_capacity: Gauge,
    pub free_capacity: Gauge,
    pub used_capacity_percent: Gauge,
    pub status: GaugeVec,
    pub parse_error_counter: Gauge,
    pub command_error_counter: Gauge,
    pub no_pool_available_counter: Gauge,
    pub incomplete_stdout_counter: Gauge,
    pub reject_request_counter: Gauge,
}

impl PoolMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            size: gauge("pool_size", "Size of pool")?,
            used_capacity: gauge("used_pool_capacity", "Capacity used by pool")?,
            free_capacity: gauge("free_pool_capacity", "Free capacity in pool")?,
            used_capacity_percent: gauge(
                "used_pool_capacity_percent",
                "Capacity used by pool in percent",
            )?,
            status: gauge_vec(
                "pool_status",
                "Status of pool (0, 1, 2, 3, 4, 5, 6) = {\"Offline\", \"Online\", \"Degraded\", \"Faulted\", \"Removed\", \"Unavail\", \"NoPoolsAvailable\"}",
                &["pool"],
            )?,
            parse_error_counter: gauge(
                "zpool_list_parse_error_count",
                "Total no of parsing errors",
            )?,
            command_error_counter: gauge(
                "zpool_command_error",
                "Total no of zpool command errors",
            )?,
            no_pool_available_counter: gauge(
                "no_pool_available_error",
                "Total no of no pool available errors",
            )?,
            incomplete_stdout_counter: gauge(
                "zpool_list_incomplete_stdout_error",
                "Total no of incomplete stdout of zpool list command errors",
            )?,
            reject_request_counter: gauge(
                "zpool_reject_request_count",
                "Total no of rejected requests of zpool metrics",
            )?,
        })
    }

    pub fn register_on(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.size.clone()))?;
        registry.register(Box::new(self.used_capacity.clone()))?;
        registry.register(Box::new(self.free_capacity.clone()))?;
        registry.register(Box::new(self.used_capacity_percent.clone()))?;
        registry.register(Box::new(self.status.clone()))?;
        registry.register(Box::new(self.parse_error_counter.clone()))?;
        registry.register(Box::new(self.command_error_counter.clone()))?;
        registry.register(Box::new(self.no_pool_available_counter.clone()))?;
        registry.register(Box::new(self.incomplete_stdout_counter.clone()))?;
        registry.register(Box::new(self.reject_request_counter.clone()))?;
        Ok(())
    }

    /// Writes one `zpool list -Hp` row. Status code 6 (NoPoolsAvailable)
    /// never reaches here; the collector emits the synthetic status entry
    /// without touching the capacity gauges.
    pub fn set(&self, name: &str, size: f64, used: f64, free: f64, used_percent: f64, status: PoolStatus) {
        self.size.set(size);
        self.used_capacity.set(used);
        self.free_capacity.set(free);
        self.used_capacity_percent.set(used_percent);
        self.status.with_label_values(&[name]).set(status.code() as f64);
    }
}

/// Per-dataset I/O metrics written by the `zfs stats` collector. Labels are
/// `{vol, pool}` throughout.
#[derive(Clone)]
pub struct ZvolStatsMetrics {
    pub read_bytes: GaugeVec,
    pub write_bytes: GaugeVec,
    pub read_count: GaugeVec,
    pub write_count: GaugeVec,
    pub sync_count: GaugeVec,
    pub sync_latency: GaugeVec,
    pub read_latency: GaugeVec,
    pub write_latency: GaugeVec,
    pub replica_status: GaugeVec,
    pub inflight_io_count: GaugeVec,
    pub dispatched_io_count: GaugeVec,
    pub rebuild_count: GaugeVec,
    pub rebuild_bytes: GaugeVec,
    pub rebuild_status: GaugeVec,
    pub rebuild_done_count: GaugeVec,
    pub rebuild_failed_count: GaugeVec,
    pub command_error_counter: Gauge,
    pub parse_error_counter: Gauge,
    pub reject_request_counter: Gauge,
}

impl ZvolStatsMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let labels = &["vol", "pool"];
        Ok(Self {
            read_bytes: gauge_vec(
                "total_read_bytes",
                "Total read in bytes of volume replica",
                labels,
            )?,
            write_bytes: gauge_vec(
                "total_write_bytes",
                "Total write in bytes of volume replica",
                labels,
            )?,
            read_count: gauge_vec(
                "total_read_count",
                "Total read io count of volume replica",
                labels,
            )?,
            write_count: gauge_vec(
                "total_write_count",
                "Total write io count of volume replica",
                labels,
            )?,
            sync_count: gauge_vec("sync_count", "Total sync io count of volume replica", labels)?,
            sync_latency: gauge_vec("sync_latency", "Sync latency on volume replica", labels)?,
            read_latency: gauge_vec("read_latency", "Read latency on volume replica", labels)?,
            write_latency: gauge_vec("write_latency", "Write latency on volume replica", labels)?,
            replica_status: gauge_vec(
                "replica_status",
                "Status of volume replica (0, 1, 2, 3) = {\"Offline\", \"Healthy\", \"Degraded\", \"Rebuilding\"}",
                labels,
            )?,
            inflight_io_count: gauge_vec(
                "inflight_io_count",
                "Inflight IO's count of volume replica",
                labels,
            )?,
            dispatched_io_count: gauge_vec(
                "dispatched_io_count",
                "Dispatched IO's count of volume replica",
                labels,
            )?,
            rebuild_count: gauge_vec("rebuild_count", "Rebuild count of volume replica", labels)?,
            rebuild_bytes: gauge_vec("rebuild_bytes", "Rebuild bytes of volume replica", labels)?,
            rebuild_status: gauge_vec(
                "rebuild_status",
                "Status of rebuild on volume replica (0, 1, 2, 3, 4, 5, 6) = {\"INIT\", \"DONE\", \"SNAP REBUILD INPROGRESS\", \"ACTIVE DATASET REBUILD INPROGRESS\", \"ERRORED\", \"FAILED\", \"UNKNOWN\"}",
                labels,
            )?,
            rebuild_done_count: gauge_vec(
                "total_rebuild_done",
                "Total no of rebuild done on volume replica",
                labels,
            )?,
            rebuild_failed_count: gauge_vec(
                "total_failed_rebuild",
                "Total no of failed rebuilds on volume replica",
                labels,
            )?,
            command_error_counter: gauge("zfs_command_error", "Total no of zfs command errors")?,
            parse_error_counter: gauge(
                "zfs_stats_parse_error_counter",
                "Total no of zfs stats parse errors",
            )?,
            reject_request_counter: gauge(
                "zfs_stats_reject_request_count",
                "Total no of rejected requests of zfs stats",
            )?,
        })
    }

    pub fn register_on(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.read_bytes.clone()))?;
        registry.register(Box::new(self.write_bytes.clone()))?;
        registry.register(Box::new(self.read_count.clone()))?;
        registry.register(Box::new(self.write_count.clone()))?;
        registry.register(Box::new(self.sync_count.clone()))?;
        registry.register(Box::new(self.sync_latency.clone()))?;
        registry.register(Box::new(self.read_latency.clone()))?;
        registry.register(Box::new(self.write_latency.clone()))?;
        registry.register(Box::new(self.replica_status.clone()))?;
        registry.register(Box::new(self.inflight_io_count.clone()))?;
        registry.register(Box::new(self.dispatched_io_count.clone()))?;
        registry.register(Box::new(self.rebuild_count.clone()))?;
        registry.register(Box::new(self.rebuild_bytes.clone()))?;
        registry.register(Box::new(self.rebuild_status.clone()))?;
        registry.register(Box::new(self.rebuild_done_count.clone()))?;
        registry.register(Box::new(self.rebuild_failed_count.clone()))?;
        registry.register(Box::new(self.command_error_counter.clone()))?;
        registry.register(Box::new(self.parse_error_counter.clone()))?;
        registry.register(Box::new(self.reject_request_counter.clone()))?;
        Ok(())
    }

    pub fn set(&self, pool: &str, vol: &str, stat: &ZvolStat) {
        let labels = &[vol, pool];
        self.read_bytes.with_label_values(labels).set(stat.read_bytes);
        self.write_bytes.with_label_values(labels).set(stat.write_bytes);
        self.read_count.with_label_values(labels).set(stat.read_count);
        self.write_count.with_label_values(labels).set(stat.write_count);
        self.sync_count.with_label_values(labels).set(stat.sync_count);
        self.sync_latency.with_label_values(labels).set(stat.sync_latency);
        self.read_latency.with_label_values(labels).set(stat.read_latency);
        self.write_latency.with_label_values(labels).set(stat.write_latency);
        self.replica_status
            .with_label_values(labels)
            .set(stat.status.code() as f64);
        self.inflight_io_count
            .with_label_values(labels)
            .set(stat.inflight_io_count);
        self.dispatched_io_count
            .with_label_values(labels)
            .set(stat.dispatched_io_count);
        self.rebuild_count.with_label_values(labels).set(stat.rebuild_count);
        self.rebuild_bytes.with_label_values(labels).set(stat.rebuild_bytes);
        self.rebuild_status
            .with_label_values(labels)
            .set(stat.rebuild_status.code() as f64);
        self.rebuild_done_count
            .with_label_values(labels)
            .set(stat.rebuild_done_count);
        self.rebuild_failed_count
            .with_label_values(labels)
            .set(stat.rebuild_failed_count);
    }
}

/// Per-dataset capacity metrics written by the `zfs list` collector.
#[derive(Clone)]
pub struct ZvolListMetrics {
    pub used_size: GaugeVec,
    pub available_size: GaugeVec,
    pub parse_error_counter: Gauge,
    pub command_error_counter: Gauge,
    pub reject_request_counter: Gauge,
}

impl ZvolListMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            used_size: gauge_vec(
                "used_size",
                "Used size of volume replica on a pool",
                &["name"],
            )?,
            available_size: gauge_vec(
                "available_size",
                "Available size of volume replica on a pool",
                &["name"],
            )?,
            parse_error_counter: gauge(
                "zfs_list_parse_error",
                "Total no of zfs list parse errors",
            )?,
            command_error_counter: gauge(
                "zfs_list_command_error",
                "Total no of zfs list command errors",
            )?,
            reject_request_counter: gauge(
                "zfs_list_request_reject_count",
                "Total no of rejected requests of zfs list",
            )?,
        })
    }

    pub fn register_on(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.used_size.clone()))?;
        registry.register(Box::new(self.available_size.clone()))?;
        registry.register(Box::new(self.parse_error_counter.clone()))?;
        registry.register(Box::new(self.command_error_counter.clone()))?;
        registry.register(Box::new(self.reject_request_counter.clone()))?;
        Ok(())
    }
}

/// Pool-liveness metrics written by the `zfs get livenesstimestamp` collector.
#[derive(Clone)]
pub struct PoolSyncMetrics {
    pub last_sync_time: GaugeVec,
    pub state_unknown: GaugeVec,
    pub sync_time_command_error: GaugeVec,
    pub reject_request_counter: Gauge,
}

impl PoolSyncMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            last_sync_time: gauge_vec("zpool_last_sync_time", "Last sync time of pool", &["pool"])?,
            state_unknown: gauge_vec("zpool_state_unknown", "zpool state unknown", &["pool"])?,
            sync_time_command_error: gauge_vec(
                "zpool_sync_time_command_error",
                "Zpool sync time command error",
                &["pool"],
            )?,
            reject_request_counter: gauge(
                "zfs_get_livenesstimestamp_request_reject_count",
                "Total no of rejected requests for pool liveness",
            )?,
        })
    }

    pub fn register_on(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.last_sync_time.clone()))?;
        registry.register(Box::new(self.state_unknown.clone()))?;
        registry.register(Box::new(self.sync_time_command_error.clone()))?;
        registry.register(Box::new(self.reject_request_counter.clone()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gib_divisor_is_exact() {
        assert_eq!(bytes_to_gb(1_073_741_824.0), 1.0);
        assert_eq!(bytes_to_gb(10_737_418_240.0), 10.0);
    }

    #[test]
    fn mib_divisor_is_the_inherited_constant() {
        // Deliberately not 2^20.
        assert_eq!(BYTES_TO_MB, 1_048_567.0);
        assert_eq!(bytes_to_mb(1_048_567.0), 1.0);
    }

    #[test]
    fn groups_register_without_collision() {
        let registry = Registry::new();
        PoolMetrics::new().unwrap().register_on(&registry).unwrap();
        ZvolStatsMetrics::new().unwrap().register_on(&registry).unwrap();
        ZvolListMetrics::new().unwrap().register_on(&registry).unwrap();
        PoolSyncMetrics::new().unwrap().register_on(&registry).unwrap();
    }

    #[test]
    fn volume_group_registers_alone() {
        let registry = Registry::new();
        VolumeMetrics::new().unwrap().register_on(&registry).unwrap();
    }
}
