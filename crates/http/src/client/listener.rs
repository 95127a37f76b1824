//! Session event hook
//!
//! The client never reaches into UI state directly. Whatever owns the
//! front-end session registers a [`SessionListener`] and receives notices
//! and reset requests from the request pipeline.

use std::fmt;
use tutora_core::StoredSession;

/// Severity of a user-visible notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Transient message meant for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub const SESSION_EXPIRED: &'static str = "Your session has expired. Please sign in again.";
    pub const ACCESS_DENIED: &'static str = "Access denied. Please sign in again.";
    pub const NETWORK_FAILURE: &'static str =
        "Unable to reach the server. Please check your connection and try again.";

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Why the client dropped the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// Token renewal failed after a 401
    SessionExpired,
    /// The server answered 403
    AccessDenied,
}

impl ResetReason {
    /// Notice shown to the user for this reset
    pub fn notice(self) -> Notice {
        match self {
            Self::SessionExpired => Notice::warning(Notice::SESSION_EXPIRED),
            Self::AccessDenied => Notice::error(Notice::ACCESS_DENIED),
        }
    }
}

/// Receiver of session events raised while handling responses
///
/// Both methods are called synchronously from the request task, before the
/// failing request returns to its caller.
pub trait SessionListener: Send + Sync {
    /// A notice should be surfaced to the user
    fn on_notice(&self, notice: &Notice);

    /// A renewed token has been saved; in-memory session state must follow
    fn on_session_renewed(&self, session: &StoredSession);

    /// The token store has been cleared; in-memory session state must follow
    fn on_session_reset(&self, reason: ResetReason);
}
