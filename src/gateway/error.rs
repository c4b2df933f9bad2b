use reqwest::StatusCode;
use thiserror::Error;

/// Why a credential renewal did not produce a new access token.
///
/// Cloned to every request that was queued behind the renewal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenewalError {
    #[error("no refresh token stored")]
    MissingRefreshToken,

    #[error("refresh rejected by server ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("refresh request failed: {0}")]
    Transport(String),

    #[error("token store error during refresh: {0}")]
    Store(String),

    #[error("renewal abandoned before it settled")]
    Abandoned,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("credential renewal failed: {0}")]
    Renewal(#[from] RenewalError),

    /// Still unauthorized after a renewal; credentials have been cleared
    #[error("session expired, please log in again")]
    SessionExpired,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("API error ({status}): {message}")]
    Status { status: StatusCode, message: String },

    #[error("token store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Path resolved to a different origin than the API base URL
    #[error("refusing to send credentials outside the API origin: {0}")]
    ForeignUrl(String),
}

impl GatewayError {
    /// Terminal authentication failures; the session was torn down
    pub fn is_auth_terminal(&self) -> bool {
        match self {
            GatewayError::SessionExpired => true,
            GatewayError::Renewal(e) => *e != RenewalError::Abandoned,
            _ => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            GatewayError::Transport(e) => e.status(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
