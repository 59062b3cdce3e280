use thiserror::Error;

/// Errors from LLM provider calls.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// A network error occurred during the API call.
    #[error("network: {0}")]
    Network(String),

    /// The LLM provider returned an error response.
    #[error("provider api ({status}): {body}")]
    Api { status: u16, body: String },

    /// The provider response could not be parsed.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// No API key is configured for the selected provider.
    #[error("no API key configured for {0}")]
    MissingCredentials(String),
}

impl ModelError {
    /// Coarse failure category used to pick a user-facing message.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MissingCredentials(_) => FailureKind::Auth,
            Self::Api { status, body } => FailureKind::from_status(*status)
                .unwrap_or_else(|| FailureKind::from_text(body)),
            // Classify the payload only; the variant prefix must not match.
            Self::Network(message) | Self::InvalidResponse(message) => {
                FailureKind::from_text(message)
            }
        }
    }
}

/// Category of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Quota,
    RateLimit,
    Auth,
    Other,
}

impl FailureKind {
    /// Map an HTTP status to a category, if it names one.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            402 => Some(Self::Quota),
            429 => Some(Self::RateLimit),
            401 | 403 => Some(Self::Auth),
            _ => None,
        }
    }

    /// Classify by keywords in the error text.
    pub fn from_text(text: &str) -> Self {
        let text = text.to_lowercase();
        if text.contains("quota") || text.contains("insufficient_quota") {
            Self::Quota
        } else if text.contains("rate") && text.contains("limit") {
            Self::RateLimit
        } else if text.contains("invalid") && text.contains("key") {
            Self::Auth
        } else {
            Self::Other
        }
    }
}
