use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("database lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, Error>;
