//! Client error types

use super::store::StoreError;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// 401 that could not be recovered by a token renewal
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Token renewal failed; the session has been cleared
    #[error("Session expired")]
    SessionExpired,

    /// Forbidden; the session has been cleared
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Token store failure
    #[error("Token storage error: {0}")]
    Storage(#[from] StoreError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Whether handling this error already dropped the session
    pub const fn clears_session(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::Forbidden(_))
    }

    /// HTTP status behind the error, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ServerError { status, .. } => Some(*status),
            Self::Unauthorized(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::BadRequest(_) => Some(400),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn status_codes_map_to_variants() {
        assert!(matches!(
            ClientError::from_status(StatusCode::BAD_REQUEST, "x".into()),
            ClientError::BadRequest(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::UNAUTHORIZED, "x".into()),
            ClientError::Unauthorized(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::FORBIDDEN, "x".into()),
            ClientError::Forbidden(_)
        ));
        let err = ClientError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "Invalid price".into());
        assert_eq!(err.status(), Some(422));
        assert_eq!(err.to_string(), "Server error 422: Invalid price");
    }

    #[test]
    fn only_expiry_and_forbidden_clear_the_session() {
        assert!(ClientError::SessionExpired.clears_session());
        assert!(ClientError::Forbidden(String::new()).clears_session());
        assert!(!ClientError::Unauthorized(String::new()).clears_session());
        assert!(!ClientError::NotFound(String::new()).clears_session());
    }
}
