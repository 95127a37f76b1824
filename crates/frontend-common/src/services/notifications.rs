//! Chat notification wiring for the signed-in user

use crate::auth::{AuthContext, AuthError};
use tutora_core::Role;
use tutora_http::notifications::{
    NotificationError, NotificationHub, NotificationTransport, ParticipantKind, Registration,
    socket_url,
};
use url::Url;

/// What a front-end needs to open the notification socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConnect {
    /// Socket URL carrying the bearer token
    pub url: Url,
    /// Registration to send once connected
    pub registration: Registration,
}

/// Notification service bound to an auth context
#[derive(Clone)]
pub struct NotificationService {
    auth: AuthContext,
    hub: NotificationHub,
}

impl NotificationService {
    pub fn new(auth: AuthContext) -> Self {
        Self {
            auth,
            hub: NotificationHub::default(),
        }
    }

    pub const fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    /// Connection parameters for the current session
    ///
    /// Returns `Ok(None)` for sessions that do not take part in chats (admins).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotAuthenticated`] without a token or a loaded
    /// profile
    pub fn prepare(&self) -> Result<Option<NotificationConnect>, AuthError> {
        let state = self.auth.snapshot();
        let (Some(token), Some(user)) = (state.token(), state.user.as_ref()) else {
            return Err(AuthError::NotAuthenticated);
        };

        let kind = match state.role().or(user.role) {
            Some(Role::Student) => ParticipantKind::Student,
            Some(Role::Tutor) => ParticipantKind::Tutor,
            Some(Role::Admin) | None => return Ok(None),
        };

        let client = self.auth.client();
        let url = socket_url(client.base_url(), &client.endpoints().socket_path, token)
            .map_err(|e| tutora_http::ClientError::Configuration(e.to_string()))?;

        Ok(Some(NotificationConnect {
            url,
            registration: Registration {
                kind,
                id: user.id.clone(),
            },
        }))
    }

    /// Drive an open socket until it closes
    ///
    /// # Errors
    ///
    /// Returns transport failures from the hub
    pub async fn run<T: NotificationTransport>(
        &self,
        transport: T,
        registration: Registration,
    ) -> Result<(), NotificationError> {
        self.hub.run(transport, registration).await
    }
}
