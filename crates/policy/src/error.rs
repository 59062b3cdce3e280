//! Policy error types.

use thiserror::Error;

/// Policy errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A configured PII entity name is not recognised.
    #[error("unknown PII entity: {0}")]
    UnknownEntity(String),

    /// A configured term could not be compiled into a matcher.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The guardrail configuration is invalid.
    #[error("invalid policy: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, Error>;
