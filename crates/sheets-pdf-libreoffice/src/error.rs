//! Error types for the LibreOffice backend.

use std::path::PathBuf;

use libreoffice_urp::UrpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("URP protocol error: {0}")]
    Urp(#[from] UrpError),

    #[error("Failed to spawn LibreOffice: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("LibreOffice not found at '{0}'. Install LibreOffice and ensure 'soffice' is in PATH.")]
    NotFound(PathBuf),

    #[error("Could not prepare LibreOffice profile directory: {0}")]
    Profile(#[source] std::io::Error),

    #[error("Port {port} is already in use; refusing to start a second office on it")]
    PortInUse {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("LibreOffice exited during startup ({0})")]
    ProcessExited(std::process::ExitStatus),

    #[error("Connection timeout: LibreOffice did not start within {0} seconds")]
    StartupTimeout(u64),

    #[error("Conversion did not finish within {0} seconds")]
    TaskTimeout(u64),

    #[error("LibreOffice backend is not running")]
    NotRunning,

    #[error("Cannot convert '{from}' to '{to}'")]
    UnsupportedConversion { from: String, to: String },

    #[error("Path cannot be expressed as a file URL: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("LibreOffice could not load {0}")]
    LoadFailed(String),

    #[error("{operation} failed: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: UrpError,
    },

    #[error("Failed to stop LibreOffice: {0}")]
    StopFailed(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BackendError>;
