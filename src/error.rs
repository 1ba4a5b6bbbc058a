use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExporterError {
    /// Transport-level failure to reach a stats source (HTTP dial, socket
    /// connect, read or write). The owning adapter drops its connection
    /// handle before returning this.
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed payload from an otherwise reachable source.
    #[error("parse error: {0}")]
    Parse(String),

    /// Child process exited non-zero or hit its wall-clock timeout.
    #[error("command error: {0}")]
    Command(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP server error: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, ExporterError>;
