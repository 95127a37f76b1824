//! Wire types for the authentication endpoints

use serde::{Deserialize, Serialize};
use tutora_core::{AuthenticatedUser, Role};

/// `POST /refresh` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    /// Newly issued bearer token
    #[serde(alias = "accessToken", alias = "access_token")]
    pub token: String,
}

/// `GET /logout` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogoutResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /login` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Area the user is signing in to
    pub role: Role,
}

/// `POST /login` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "accessToken")]
    pub token: String,
    pub role: Role,
    #[serde(default)]
    pub user: Option<AuthenticatedUser>,
}

/// Error body returned by the backend
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// Best human-readable message for a failed response
    pub(crate) fn message_from(body: &str, status: reqwest::StatusCode) -> String {
        let parsed = serde_json::from_str::<Self>(body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .filter(|m| !m.trim().is_empty());

        if let Some(message) = parsed {
            return message;
        }

        let body = body.trim();
        if body.is_empty() {
            status
                .canonical_reason()
                .map_or_else(|| status.to_string(), str::to_string)
        } else {
            body.to_string()
        }
    }
}
