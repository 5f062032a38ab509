//! Error types surfaced to callers of the API client

use serde::Deserialize;

/// Error body the server sends with 4xx/5xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<FieldError>,
}

/// A single per-field validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Errors from API client operations.
///
/// `Clone` because a failed token refresh is delivered to every request that
/// queued behind it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("{path} returned {status}: {message}")]
    Api {
        status: u16,
        path: String,
        message: String,
        details: Option<ApiErrorBody>,
    },

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("credential store error: {0}")]
    Credential(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status of a server-side failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server answered 401.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Whether the session ended and the user has to log in again.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Error::RefreshFailed(_))
    }
}

impl From<medkit_auth::Error> for Error {
    fn from(err: medkit_auth::Error) -> Self {
        match err {
            medkit_auth::Error::Http(_)
            | medkit_auth::Error::TokenExchange(_)
            | medkit_auth::Error::InvalidCredentials(_) => Error::RefreshFailed(err.to_string()),
            medkit_auth::Error::CredentialParse(_) | medkit_auth::Error::Io(_) => {
                Error::Credential(err.to_string())
            }
        }
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
