//! Error types for API calls and credential refresh

/// Failure of a dispatched call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// No response was received
    #[error("transport error: {0}")]
    Transport(String),

    /// A response arrived with an HTTP status other than 200 or 401
    #[error("network error: HTTP {0}")]
    Network(u16),

    /// HTTP 200 but the envelope code was not the success sentinel
    #[error("{0}")]
    Application(String),

    /// 401 with no refresh token, or 401 again after a replay
    #[error("unauthorized")]
    Unauthorized,

    /// The refresh endpoint rejected the refresh token or could not be reached
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ApiError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Transport(_) => "transport",
            ApiError::Network(_) => "network",
            ApiError::Application(_) => "application",
            ApiError::Unauthorized => "unauthorized",
            ApiError::RefreshFailed(_) => "refresh_failed",
            ApiError::Serialization(_) => "serialization",
            ApiError::InvalidInput(_) => "invalid_input",
        }
    }
}

/// Outcome of a refresh attempt as seen by one waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token stored")]
    NoRefreshCredential,

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
}

/// Result alias for API calls.
pub type Result<T> = std::result::Result<T, ApiError>;
