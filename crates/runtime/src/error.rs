use thiserror::Error;

use crate::model::{FailureKind, ModelError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The provider key is not in the registry.
    #[error("Unsupported provider: {key}. Available: {}", available.join(", "))]
    UnsupportedProvider { key: String, available: Vec<String> },

    #[error(transparent)]
    Model(#[from] ModelError),

    /// Input guardrails rejected the message.
    #[error("{}", reasons.join(" "))]
    Blocked { reasons: Vec<String> },

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Storage(#[from] storage::Error),

    /// A blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(String),
}

impl Error {
    /// Failure category for model errors; `None` for everything else.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Model(e) => Some(e.kind()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
