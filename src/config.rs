use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address on which to expose metrics and the landing page.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Path under which metrics are exposed.
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Storage engine the sidecar sits next to: "jiva", "cstor" or "pool".
    #[serde(default = "default_engine")]
    pub engine: String,
    /// Jiva controller REST address.
    #[serde(default = "default_controller_addr")]
    pub controller_addr: String,
    /// istgt control socket (cstor engine).
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
    /// Block at start-up until `zpool status` reports a pool (pool engine).
    #[serde(default)]
    pub wait_for_pool: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            metrics_path: default_metrics_path(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            controller_addr: default_controller_addr(),
            socket_path: default_socket_path(),
            wait_for_pool: false,
        }
    }
}

fn default_listen_addr() -> String {
    ":9500".to_string()
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_engine() -> String {
    "jiva".to_string()
}

fn default_controller_addr() -> String {
    "http://localhost:9501".to_string()
}

fn default_socket_path() -> String {
    "/var/run/istgt_ctl_sock".to_string()
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        // Load environment variables from .env if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("OPENEBS_EXPORTER").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl ServerConfig {
    /// Listen address in the form accepted by `TcpListener::bind`. The
    /// conventional sidecar flag value `:9500` leaves the host empty.
    pub fn bind_addr(&self) -> String {
        if self.listen_addr.starts_with(':') {
            format!("0.0.0.0{}", self.listen_addr)
        } else {
            self.listen_addr.clone()
        }
    }
}
