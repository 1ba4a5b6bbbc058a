//! UNIX-socket volume source for the cstor engine.
//!
//! The istgt target exposes statistics over a control socket speaking a
//! request/response line protocol:
//!
//! 1. On connect the target sends a banner; the client reads until the
//!    buffer starts with `"iSCSI Target Controller version"` and ends with
//!    CRLF, then discards it.
//! 2. The client writes the ASCII command `"IOSTATS\n"`.
//! 3. The response is read until it ends with the 12-byte framer
//!    `"OK IOSTATS\r\n"`; the payload is the first non-empty CRLF-separated
//!    element with the echoed `"IOSTATS  "` prefix stripped, a JSON object.
//!
//! The connection is created lazily on the first scrape and zeroed on any
//! I/O error so the next scrape reconnects. Reads carry no deadline; a
//! stalled target holds the scrape open (known limitation of the protocol).

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{ExporterError, Result};
use crate::metrics::VolumeMetrics;
use crate::source::types::{VolumeRecord, VolumeStats};
use crate::source::VolumeSource;

pub const DEFAULT_SOCKET_PATH: &str = "/var/run/istgt_ctl_sock";

const HEADER_PREFIX: &[u8] = b"iSCSI Target Controller version";
const EOL: &[u8] = b"\r\n";
const COMMAND: &[u8] = b"IOSTATS\n";
const FOOTER: &str = "OK IOSTATS";
const RESPONSE_PREFIX: &str = "IOSTATS  ";

/// Volume source backed by the istgt control socket.
///
/// The mutex serializes the full fetch and decode sequence; two concurrent
/// `IOSTATS` exchanges on one socket would entangle their frames.
pub struct CstorSource {
    path: PathBuf,
    conn: Mutex<Option<UnixStream>>,
}

impl CstorSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: Mutex::new(None),
        }
    }

    /// Connects and consumes the banner. The banner arrives in one or more
    /// chunks; it is complete once the buffer carries the version prefix and
    /// a trailing CRLF.
    async fn connect(&self) -> Result<UnixStream> {
        let mut stream = UnixStream::connect(&self.path).await.map_err(|err| {
            ExporterError::Connection(format!(
                "failed to connect to {}: {}",
                self.path.display(),
                err
            ))
        })?;
        let mut banner = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.map_err(|err| {
                ExporterError::Connection(format!("failed to read header: {}", err))
            })?;
            if n == 0 {
                return Err(ExporterError::Connection(
                    "connection closed while reading header".to_string(),
                ));
            }
            banner.extend_from_slice(&chunk[..n]);
            if banner.starts_with(HEADER_PREFIX) && banner.ends_with(EOL) {
                break;
            }
        }
        debug!("discarded banner: {}", String::from_utf8_lossy(&banner));
        info!("connected to {}", self.path.display());
        Ok(stream)
    }

    /// Sends `IOSTATS` and reads until the framer.
    async fn exchange(stream: &mut UnixStream) -> Result<String> {
        stream
            .write_all(COMMAND)
            .await
            .map_err(|err| ExporterError::Connection(format!("failed to write command: {}", err)))?;
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.map_err(|err| {
                ExporterError::Connection(format!("failed to read response: {}", err))
            })?;
            if n == 0 {
                return Err(ExporterError::Connection(
                    "connection closed while reading response".to_string(),
                ));
            }
            buf.extend_from_slice(&chunk[..n]);
            if buf.ends_with(b"OK IOSTATS\r\n") {
                break;
            }
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Extracts the JSON payload from a framed response: the first non-empty
/// CRLF-separated element that is not the framer, with the echoed command
/// prefix stripped.
fn extract_payload(response: &str) -> Result<&str> {
    response
        .split("\r\n")
        .find(|part| !part.is_empty() && *part != FOOTER)
        .map(|part| part.strip_prefix(RESPONSE_PREFIX).unwrap_or(part))
        .ok_or_else(|| ExporterError::Parse("empty IOSTATS response".to_string()))
}

#[async_trait]
impl VolumeSource for CstorSource {
    fn cas_type(&self) -> &'static str {
        "cstor"
    }

    async fn get(&self, metrics: &VolumeMetrics) -> Result<VolumeStats> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            metrics.connection_retry_counter.inc();
            match self.connect().await {
                Ok(stream) => *guard = Some(stream),
                Err(err) => {
                    metrics.connection_error_counter.inc();
                    return Err(err);
                }
            }
        }
        let stream = match guard.as_mut() {
            Some(stream) => stream,
            None => return Err(ExporterError::Connection("no connection".to_string())),
        };
        let response = match Self::exchange(stream).await {
            Ok(response) => response,
            Err(err) => {
                // Zero the handle; the next scrape reconnects.
                *guard = None;
                metrics.connection_error_counter.inc();
                return Err(err);
            }
        };
        let payload = extract_payload(&response).map_err(|err| {
            metrics.parse_error_counter.inc();
            err
        })?;
        let mut stats: VolumeStats = serde_json::from_str(payload).map_err(|err| {
            metrics.parse_error_counter.inc();
            ExporterError::Parse(format!("failed to decode IOSTATS payload: {}", err))
        })?;
        stats.got = true;
        Ok(stats)
    }

    fn parse(&self, stats: &VolumeStats, metrics: &VolumeMetrics) -> VolumeRecord {
        let mut rec = stats.to_record(metrics);
        rec.cas_type = self.cas_type().to_string();
        // istgt reports no Name field; the volume name is the IQN suffix.
        rec.name = stats.iqn.split(':').nth(1).unwrap_or_default().to_string();
        rec.iqn = stats.iqn.clone();
        rec.address = "127.0.0.1".to_string();
        rec
    }
}
