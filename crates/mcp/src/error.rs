//! Tool endpoint error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Transport setup, handshake or catalog fetch failed during connect.
    #[error("connection failed: {0}")]
    ConnectionFailure(String),

    /// No active session with the tool endpoint.
    #[error("not connected to tool endpoint")]
    NotConnected,

    /// The endpoint rejected or failed a tool invocation.
    #[error("{0}")]
    ToolExecutionFailure(String),

    /// A configured header could not be encoded.
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
