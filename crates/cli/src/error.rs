//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The database file does not exist.
    ///
    /// This typically means no chat has happened yet.
    #[error("database not found at {path}. Run 'advisor chat' or 'advisor serve' first")]
    DatabaseNotFound { path: PathBuf },

    /// No session was found matching the given prefix.
    #[error("no session found matching '{prefix}'")]
    SessionNotFound { prefix: String },

    /// Multiple sessions match the given prefix.
    ///
    /// The user should provide a longer prefix to disambiguate.
    #[error("multiple sessions match '{prefix}': {matches:?}")]
    AmbiguousSession {
        prefix: String,
        matches: Vec<String>,
    },

    /// Configuration is invalid or could not be read.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The log subscriber could not be installed.
    #[error("logging setup failed: {0}")]
    Logging(String),

    /// An error occurred in the runtime layer.
    #[error(transparent)]
    Runtime(#[from] runtime::Error),

    /// An error occurred talking to the tool endpoint.
    #[error(transparent)]
    Mcp(#[from] mcp::Error),

    /// An error occurred in the storage layer.
    #[error(transparent)]
    Storage(#[from] storage::Error),

    /// An error occurred in the policy layer.
    #[error(transparent)]
    Policy(#[from] policy::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<runtime::ModelError> for Error {
    fn from(err: runtime::ModelError) -> Self {
        Self::Runtime(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
