//! Session and identity types shared by the client and the front-end state

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Marketplace role attached to an authenticated session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Tutor,
    Admin,
}

impl Role {
    /// All roles, in area order
    pub const ALL: [Self; 3] = [Self::Student, Self::Tutor, Self::Admin];

    /// Lowercase wire name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Tutor => "tutor",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "tutor" => Ok(Self::Tutor),
            "admin" => Ok(Self::Admin),
            other => Err(CoreError::invalid_role(other)),
        }
    }
}

/// Credentials persisted by a token store under the `token` and `role` keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    #[serde(default)]
    pub role: Option<Role>,
}

impl StoredSession {
    pub fn new(token: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            token: token.into(),
            role,
        }
    }
}

/// In-memory view of the current session
///
/// `is_authenticated` always mirrors the presence of a token. Expiry is
/// decided by the server; a 401 is the only signal the client gets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    role: Option<Role>,
}

impl Session {
    /// An empty, unauthenticated session
    pub const fn anonymous() -> Self {
        Self {
            token: None,
            role: None,
        }
    }

    pub fn authenticated(token: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            token: Some(token.into()),
            role,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub const fn role(&self) -> Option<Role> {
        self.role
    }

    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

impl From<StoredSession> for Session {
    fn from(stored: StoredSession) -> Self {
        Self::authenticated(stored.token, stored.role)
    }
}

impl From<Option<StoredSession>> for Session {
    fn from(stored: Option<StoredSession>) -> Self {
        stored.map_or_else(Self::anonymous, Self::from)
    }
}

/// Cached profile of the signed-in user
///
/// Not authoritative: the next successful profile fetch replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}
