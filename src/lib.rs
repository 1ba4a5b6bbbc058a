//! OpenEBS storage-telemetry exporter
//!
//! A sidecar that runs next to an OpenEBS storage target or pool container,
//! collects per-volume and per-pool statistics from the engine it sits
//! beside, and exposes them for scraping in the Prometheus exposition
//! format (text, or JSON via `?format=json`).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  HTTP /v1/stats   ┌───────────────────────────┐
//! │ jiva ctrl    │ ◄───────────────► │         Exporter          │
//! └──────────────┘                   │  ┌──────────┐             │
//! ┌──────────────┐  UNIX socket      │  │ sources  │             │      HTTP      ┌────────────┐
//! │ istgt target │ ◄───────────────► │  └──────────┘             │ ◄────────────► │ Prometheus │
//! └──────────────┘                   │  ┌──────────┐ ┌─────────┐ │   /metrics     └────────────┘
//! ┌──────────────┐  child process    │  │collectors│ │ metrics │ │
//! │ zpool / zfs  │ ◄───────────────► │  └──────────┘ └─────────┘ │
//! └──────────────┘                   └───────────────────────────┘
//! ```
//!
//! Collection is pull-driven: each scrape runs every registered collector
//! once, then renders the registry. There is no background refresh loop.
//!
//! # Modules
//!
//! - [`source`] - volume source adapters (jiva HTTP, cstor socket) and the
//!   child-process runner for `zpool`/`zfs`
//! - [`collectors`] - the scrape registry and the per-source collectors
//! - [`metrics`] - the canonical `openebs_` metric catalogue
//! - [`exposition`] - text and JSON rendering of gathered families
//! - [`server`] - HTTP surface
//! - [`config`] - configuration management
//! - [`error`] - error types

pub mod collectors;
pub mod config;
pub mod error;
pub mod exposition;
pub mod metrics;
pub mod server;
pub mod source;
