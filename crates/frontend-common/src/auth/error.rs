//! Errors surfaced by the session state container

use thiserror::Error;
use tutora_http::{ClientError, StoreError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Session storage failed: {0}")]
    Storage(#[from] StoreError),

    /// An operation needed a signed-in session
    #[error("Not signed in")]
    NotAuthenticated,
}

impl AuthError {
    /// Whether the client already dropped the session while handling this
    pub const fn cleared_session(&self) -> bool {
        match self {
            Self::Client(e) => e.clears_session(),
            _ => false,
        }
    }
}
