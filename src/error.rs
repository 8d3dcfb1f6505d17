use thiserror::Error;

/// HTTP statuses worth another attempt: rate limiting and transient server faults.
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Message fragments that mark an otherwise unclassified error as transient.
const RETRYABLE_MARKERS: [&str; 6] = [
    "rate limit",
    "timeout",
    "network",
    "econnreset",
    "etimedout",
    "connection reset",
];

#[derive(Debug, Error)]
pub enum LocatorError {
    /// The request never produced an HTTP response (DNS, connect, reset, timeout).
    #[error("network error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("{operation}: {status} {body}")]
    Http {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Assistant run failed")]
    JobFailed { job_id: String },

    #[error("Assistant run timed out after {attempts} status checks")]
    JobTimeout { attempts: u32 },

    #[error("No response from assistant")]
    EmptyResponse,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Failed to lookup PSAP: {0}")]
    PrimaryLookup(#[source] Box<LocatorError>),

    #[error("Failed to find nearby PSAPs: {0}")]
    NearbyLookup(#[source] Box<LocatorError>),
}

pub type Result<T> = std::result::Result<T, LocatorError>;

impl LocatorError {
    /// Whether the retry policy may attempt the failed operation again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status, .. } => RETRYABLE_STATUS_CODES.contains(status),
            Self::JobFailed { .. }
            | Self::JobTimeout { .. }
            | Self::EmptyResponse
            | Self::InvalidInput(_)
            | Self::Config(_)
            | Self::Json(_)
            | Self::PrimaryLookup(_)
            | Self::NearbyLookup(_) => false,
            Self::Internal(message) => {
                let message = message.to_lowercase();
                RETRYABLE_MARKERS
                    .iter()
                    .any(|marker| message.contains(marker))
            }
        }
    }

    /// The innermost error, looking through the lookup wrappers.
    pub fn root(&self) -> &LocatorError {
        match self {
            Self::PrimaryLookup(inner) | Self::NearbyLookup(inner) => inner.root(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for LocatorError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::Http {
                operation: err
                    .url()
                    .map(|url| url.path().to_string())
                    .unwrap_or_else(|| "request".to_string()),
                status: status.as_u16(),
                body: err.to_string(),
            };
        }
        if err.is_decode() {
            return Self::Internal(format!("Failed to decode backend response: {err}"));
        }
        if err.is_builder() {
            return Self::Config(format!("Invalid backend request: {err}"));
        }
        Self::Transport(err.to_string())
    }
}
