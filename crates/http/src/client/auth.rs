//! Authentication API client methods

use super::{ClientError, SessionClient, request::PendingRequest};
use crate::types::{LoginRequest, LoginResponse, LogoutResponse};
use tracing::info;
use tutora_core::AuthenticatedUser;

impl SessionClient {
    /// Exchange credentials for a token
    ///
    /// Bypasses the renewal pipeline: a 401 here means bad credentials.
    /// The caller decides whether to persist the returned token.
    pub async fn sign_in(&self, credentials: &LoginRequest) -> Result<LoginResponse, ClientError> {
        let request = PendingRequest::post(self.endpoints().login.clone()).json(credentials)?;
        let response: LoginResponse = self.send_plain(&request, false).await?;
        info!(role = %response.role, "Signed in");
        Ok(response)
    }

    /// Tell the server the session is ending
    ///
    /// Sends the current token but never renews it.
    pub async fn notify_logout(&self) -> Result<LogoutResponse, ClientError> {
        let request = PendingRequest::get(self.endpoints().logout.clone());
        self.send_plain(&request, true).await
    }

    /// Fetch the signed-in user's profile
    pub async fn current_user(&self) -> Result<AuthenticatedUser, ClientError> {
        let path = self.endpoints().me.clone();
        self.get(&path).await
    }
}
