//! Wire types shared by the volume source adapters and the metric groups.
//!
//! The jiva REST endpoint and the istgt control socket both speak JSON with
//! the same field names, but numeric values arrive as strings on one wire and
//! as numbers on the other. [`RawNum`] absorbs that difference; values are
//! parsed to `f64` late, when the record is derived.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

use crate::metrics::{bytes_to_gb, VolumeMetrics};

/// A numeric field that may arrive as a JSON string or number. Kept as text
/// until parse time; a missing field is the empty string and reads as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawNum(pub String);

impl RawNum {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Parses to f64. A malformed value degrades to zero for this field only
    /// and bumps the parse-error counter; it never aborts the snapshot.
    pub fn to_f64(&self, metrics: &VolumeMetrics) -> f64 {
        if self.0.is_empty() {
            return 0.0;
        }
        match self.0.parse::<f64>() {
            Ok(v) => v,
            Err(err) => {
                tracing::error!("failed to parse {:?}: {}", self.0, err);
                metrics.parse_error_counter.inc();
                0.0
            }
        }
    }
}

impl<'de> Deserialize<'de> for RawNum {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RawNumVisitor;

        impl<'de> Visitor<'de> for RawNumVisitor {
            type Value = RawNum;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON string or number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<RawNum, E> {
                Ok(RawNum(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<RawNum, E> {
                Ok(RawNum(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<RawNum, E> {
                Ok(RawNum(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<RawNum, E> {
                Ok(RawNum(v.to_string()))
            }

            fn visit_unit<E: de::Error>(self) -> Result<RawNum, E> {
                Ok(RawNum::default())
            }
        }

        deserializer.deserialize_any(RawNumVisitor)
    }
}

/// One replica as reported by the target.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Replica {
    #[serde(rename = "Address", default)]
    pub address: String,
    #[serde(rename = "Mode", default)]
    pub mode: String,
}

impl Replica {
    /// RW/Healthy replicas serve I/O; RO/WO/ERR/Degraded are impaired.
    pub fn is_serving(&self) -> bool {
        matches!(self.mode.as_str(), "RW" | "Healthy" | "HEALTHY")
    }

    pub fn is_impaired(&self) -> bool {
        matches!(
            self.mode.as_str(),
            "RO" | "WO" | "ERR" | "Degraded" | "DEGRADED"
        )
    }
}

/// Raw per-volume statistics as they come off the wire. Field names are
/// case-preserving; both source adapters decode into this struct.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VolumeStats {
    #[serde(rename = "iqn")]
    pub iqn: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ReadIOPS")]
    pub reads: RawNum,
    #[serde(rename = "WriteIOPS")]
    pub writes: RawNum,
    #[serde(rename = "TotalReadBytes")]
    pub total_read_bytes: RawNum,
    #[serde(rename = "TotalWriteBytes")]
    pub total_write_bytes: RawNum,
    #[serde(rename = "TotalReadTime")]
    pub total_read_time: RawNum,
    #[serde(rename = "TotalWriteTime")]
    pub total_write_time: RawNum,
    #[serde(rename = "TotalReadBlockCount")]
    pub total_read_block_count: RawNum,
    #[serde(rename = "TotalWriteBlockCount")]
    pub total_write_block_count: RawNum,
    #[serde(rename = "Size")]
    pub size: RawNum,
    #[serde(rename = "SectorSize")]
    pub sector_size: RawNum,
    #[serde(rename = "UsedLogicalBlocks")]
    pub used_logical_blocks: RawNum,
    #[serde(rename = "UsedBlocks")]
    pub used_blocks: RawNum,
    #[serde(rename = "UpTime")]
    pub uptime: RawNum,
    #[serde(rename = "RevisionCounter")]
    pub revision_counter: RawNum,
    #[serde(rename = "ReplicaCounter")]
    pub replica_counter: RawNum,
    #[serde(rename = "Replicas")]
    pub replicas: Vec<Replica>,
    #[serde(rename = "TargetStatus")]
    pub target_status: String,
    /// True only when a complete snapshot was obtained. Set by the adapter,
    /// never by the wire.
    #[serde(skip)]
    pub got: bool,
}

/// Volume status as exposed on `openebs_volume_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VolumeStatus {
    Offline,
    Degraded,
    Healthy,
    #[default]
    Unknown,
}

impl VolumeStatus {
    pub fn code(&self) -> i64 {
        match self {
            VolumeStatus::Offline => 1,
            VolumeStatus::Degraded => 2,
            VolumeStatus::Healthy => 3,
            VolumeStatus::Unknown => 4,
        }
    }
}

impl VolumeStats {
    /// Tallies replica modes into (healthy, degraded) counts.
    pub fn replica_tallies(&self) -> (f64, f64) {
        let mut healthy = 0.0;
        let mut degraded = 0.0;
        for rep in &self.replicas {
            if rep.is_serving() {
                healthy += 1.0;
            } else if rep.is_impaired() {
                degraded += 1.0;
            } else {
                tracing::error!("unknown replica mode: {}", rep.mode);
            }
        }
        (healthy, degraded)
    }

    /// Maps the reported target status to a volume status code. The istgt
    /// payload omits `TargetStatus`; in that case the status is derived from
    /// the replica modes (an explicit target status always wins).
    pub fn volume_status(&self) -> VolumeStatus {
        match self.target_status.as_str() {
            "RO" | "Offline" => VolumeStatus::Offline,
            "RW" | "Healthy" => VolumeStatus::Healthy,
            "Degraded" => VolumeStatus::Degraded,
            "" => {
                if self.replicas.is_empty() {
                    VolumeStatus::Unknown
                } else {
                    let (_, degraded) = self.replica_tallies();
                    if degraded > 0.0 {
                        VolumeStatus::Degraded
                    } else {
                        VolumeStatus::Healthy
                    }
                }
            }
            _ => VolumeStatus::Unknown,
        }
    }

    /// Derives the engine-independent part of the per-scrape record. The
    /// adapters fill in name, address, IQN and cas type on top of this.
    pub fn to_record(&self, metrics: &VolumeMetrics) -> VolumeRecord {
        if !self.got {
            tracing::warn!("got empty stats, source may not be reachable");
            return VolumeRecord::default();
        }
        let sector_size = self.sector_size.to_f64(metrics);
        let (healthy, degraded) = self.replica_tallies();
        VolumeRecord {
            got: true,
            iqn: self.iqn.clone(),
            reads: self.reads.to_f64(metrics),
            writes: self.writes.to_f64(metrics),
            total_read_bytes: self.total_read_bytes.to_f64(metrics),
            total_write_bytes: self.total_write_bytes.to_f64(metrics),
            total_read_time: self.total_read_time.to_f64(metrics),
            total_write_time: self.total_write_time.to_f64(metrics),
            total_read_block_count: self.total_read_block_count.to_f64(metrics),
            total_write_block_count: self.total_write_block_count.to_f64(metrics),
            sector_size,
            size: bytes_to_gb(self.size.to_f64(metrics)),
            logical_size: bytes_to_gb(self.used_blocks.to_f64(metrics) * sector_size),
            actual_used: bytes_to_gb(self.used_logical_blocks.to_f64(metrics) * sector_size),
            uptime: self.uptime.to_f64(metrics),
            revision_count: self.revision_counter.to_f64(metrics),
            total_replica_count: self.replica_counter.to_f64(metrics),
            healthy_replica_count: healthy,
            degraded_replica_count: degraded,
            status: self.volume_status(),
            ..VolumeRecord::default()
        }
    }
}

/// Derived per-scrape volume statistics, already numeric, with capacities in
/// GiB. This is what the metric translator consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeRecord {
    pub got: bool,
    pub cas_type: String,
    pub name: String,
    pub iqn: String,
    pub address: String,
    pub reads: f64,
    pub writes: f64,
    pub total_read_bytes: f64,
    pub total_write_bytes: f64,
    pub total_read_time: f64,
    pub total_write_time: f64,
    pub total_read_block_count: f64,
    pub total_write_block_count: f64,
    pub size: f64,
    pub sector_size: f64,
    pub logical_size: f64,
    pub actual_used: f64,
    pub uptime: f64,
    pub revision_count: f64,
    pub total_replica_count: f64,
    pub healthy_replica_count: f64,
    pub degraded_replica_count: f64,
    pub is_client_connected: f64,
    pub status: VolumeStatus,
}

/// Pool status as reported by `zpool list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    Offline,
    Online,
    Degraded,
    Faulted,
    Removed,
    Unavail,
    NoPoolsAvailable,
}

impl PoolStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OFFLINE" => Some(PoolStatus::Offline),
            "ONLINE" => Some(PoolStatus::Online),
            "DEGRADED" => Some(PoolStatus::Degraded),
            "FAULTED" => Some(PoolStatus::Faulted),
            "REMOVED" => Some(PoolStatus::Removed),
            "UNAVAIL" => Some(PoolStatus::Unavail),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            PoolStatus::Offline => 0,
            PoolStatus::Online => 1,
            PoolStatus::Degraded => 2,
            PoolStatus::Faulted => 3,
            PoolStatus::Removed => 4,
            PoolStatus::Unavail => 5,
            PoolStatus::NoPoolsAvailable => 6,
        }
    }
}

/// Dataset status as reported in the `zfs stats` JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ZvolStatus(pub String);

impl ZvolStatus {
    pub fn code(&self) -> i64 {
        match self.0.as_str() {
            "Healthy" => 1,
            "Degraded" => 2,
            "Rebuilding" => 3,
            // "Offline" and anything unrecognised
            _ => 0,
        }
    }
}

/// Rebuild status as reported in the `zfs stats` JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct RebuildStatus(pub String);

impl RebuildStatus {
    pub fn code(&self) -> i64 {
        // istgt pads some of these with trailing spaces.
        match self.0.trim_end() {
            "INIT" => 0,
            "DONE" => 1,
            "SNAP REBUILD INPROGRESS" => 2,
            "ACTIVE DATASET REBUILD INPROGRESS" => 3,
            "ERRORED" => 4,
            "FAILED" => 5,
            _ => 6,
        }
    }
}

/// One element of the `zfs stats` array: I/O and rebuild statistics for a
/// single dataset.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ZvolStat {
    /// `<pool name>/<volume name>`
    pub name: String,
    pub status: ZvolStatus,
    #[serde(rename = "rebuildStatus")]
    pub rebuild_status: RebuildStatus,
    #[serde(rename = "syncCount")]
    pub sync_count: f64,
    #[serde(rename = "readCount")]
    pub read_count: f64,
    #[serde(rename = "writeCount")]
    pub write_count: f64,
    #[serde(rename = "readByte")]
    pub read_bytes: f64,
    #[serde(rename = "writeByte")]
    pub write_bytes: f64,
    #[serde(rename = "syncLatency")]
    pub sync_latency: f64,
    #[serde(rename = "readLatency")]
    pub read_latency: f64,
    #[serde(rename = "writeLatency")]
    pub write_latency: f64,
    #[serde(rename = "rebuildCnt")]
    pub rebuild_count: f64,
    #[serde(rename = "rebuildBytes")]
    pub rebuild_bytes: f64,
    #[serde(rename = "inflightIOCnt")]
    pub inflight_io_count: f64,
    #[serde(rename = "rebuildDoneCnt")]
    pub rebuild_done_count: f64,
    #[serde(rename = "dispatchedIOCnt")]
    pub dispatched_io_count: f64,
    #[serde(rename = "rebuildFailedCnt")]
    pub rebuild_failed_count: f64,
}

impl ZvolStat {
    /// Splits `name` into `(pool, volume)` label values.
    pub fn split_name(&self) -> (&str, &str) {
        match self.name.split_once('/') {
            Some((pool, vol)) => (pool, vol),
            None => (self.name.as_str(), ""),
        }
    }
}

/// The `zfs stats` response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZvolStats {
    #[serde(rename = "stats", default)]
    pub volumes: Vec<ZvolStat>,
}
