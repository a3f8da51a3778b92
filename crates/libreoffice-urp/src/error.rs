//! URP error types.

use thiserror::Error;

/// Errors raised while talking URP to a remote office.
#[derive(Debug, Error)]
pub enum UrpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("marshaling error: {0}")]
    Marshal(String),

    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The remote side answered a call with a UNO exception.
    #[error("remote UNO exception {type_name}: {message}")]
    RemoteException { type_name: String, message: String },

    #[error("cache miss: {0}")]
    Cache(String),

    #[error("unknown type class: {0}")]
    UnknownTypeClass(u8),
}

pub type Result<T> = std::result::Result<T, UrpError>;
