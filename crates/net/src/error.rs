//! Network error types

use std::io;

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    /// Framing is broken; the stream cannot be resynchronized
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A complete frame arrived but its payload did not decode
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Not connected")]
    NotConnected,
}
