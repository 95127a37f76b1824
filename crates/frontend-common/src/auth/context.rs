//! Authentication state container
//!
//! [`AuthContext`] is an explicit, cloneable handle instead of module-level
//! state: front-ends create one at startup and pass it to whatever needs it.
//! State changes go through [`AuthContextData::reduce`] and are published on
//! a `watch` channel so route guards re-evaluate on every change.

use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use tutora_core::{AuthenticatedUser, Role, Session, StoredSession};
use tutora_http::types::{LoginRequest, LogoutResponse};
use tutora_http::{Notice, ResetReason, SessionClient, SessionListener};

use super::error::AuthError;

/// Authentication context data
#[derive(Clone, Debug, PartialEq)]
pub struct AuthContextData {
    pub session: Session,
    pub user: Option<AuthenticatedUser>,
    /// True until the stored session has been loaded
    pub is_loading: bool,
    /// Why the session was last dropped by the client, cleared on login
    pub last_reset: Option<ResetReason>,
}

/// Authentication context actions
#[derive(Clone)]
pub enum AuthAction {
    Login { token: String, role: Role },
    Hydrated(Option<StoredSession>),
    /// The client renewed the token after a 401
    Renewed(StoredSession),
    SetUser(AuthenticatedUser),
    Logout,
    Reset(ResetReason),
}

impl Default for AuthContextData {
    fn default() -> Self {
        Self {
            session: Session::anonymous(),
            user: None,
            is_loading: true, // Start with loading until the store has been read
            last_reset: None,
        }
    }
}

impl AuthAction {
    /// Action name for logs; never includes the token
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::Hydrated(_) => "hydrated",
            Self::Renewed(_) => "renewed",
            Self::SetUser(_) => "set_user",
            Self::Logout => "logout",
            Self::Reset(_) => "reset",
        }
    }
}

impl AuthContextData {
    pub const fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub const fn role(&self) -> Option<Role> {
        self.session.role()
    }

    pub fn token(&self) -> Option<&str> {
        self.session.token()
    }

    /// Apply an action, producing the next state
    pub fn reduce(&self, action: AuthAction) -> Self {
        match action {
            AuthAction::Login { token, role } => {
                // Switching roles drops the cached profile
                let user = self.user.clone().filter(|_| self.role() == Some(role));

                Self {
                    session: Session::authenticated(token, Some(role)),
                    user,
                    is_loading: false,
                    last_reset: None,
                }
            }
            AuthAction::Hydrated(stored) => Self {
                session: stored.into(),
                user: None,
                is_loading: false,
                last_reset: None,
            },
            AuthAction::Renewed(stored) => {
                // The cached profile belongs to the same account
                let role = stored.role.or_else(|| self.role());
                Self {
                    session: Session::authenticated(stored.token, role),
                    user: self.user.clone(),
                    is_loading: false,
                    last_reset: None,
                }
            }
            AuthAction::SetUser(user) => Self {
                user: Some(user),
                ..self.clone()
            },
            AuthAction::Logout => Self {
                session: Session::anonymous(),
                user: None,
                is_loading: false,
                last_reset: None,
            },
            AuthAction::Reset(reason) => Self {
                session: Session::anonymous(),
                user: None,
                is_loading: false,
                last_reset: Some(reason),
            },
        }
    }
}

/// Handle to the session state shared by a front-end
#[derive(Clone)]
pub struct AuthContext {
    inner: Arc<Inner>,
}

struct Inner {
    client: SessionClient,
    state: watch::Sender<AuthContextData>,
    notices: broadcast::Sender<Notice>,
}

impl Inner {
    fn dispatch(&self, action: AuthAction) {
        debug!(action = action.name(), "Auth action");
        self.state.send_modify(|state| *state = state.reduce(action));
    }
}

/// Routes client events into the context without keeping it alive
struct ContextListener {
    inner: Weak<Inner>,
}

impl SessionListener for ContextListener {
    fn on_notice(&self, notice: &Notice) {
        if let Some(inner) = self.inner.upgrade() {
            // Nobody listening for notices is fine
            let _ = inner.notices.send(notice.clone());
        }
    }

    fn on_session_renewed(&self, session: &StoredSession) {
        if let Some(inner) = self.inner.upgrade() {
            inner.dispatch(AuthAction::Renewed(session.clone()));
        }
    }

    fn on_session_reset(&self, reason: ResetReason) {
        if let Some(inner) = self.inner.upgrade() {
            warn!(?reason, "Session reset by client");
            inner.dispatch(AuthAction::Reset(reason));
        }
    }
}

impl AuthContext {
    /// Create the context and register it as the client's session listener
    ///
    /// The context starts in the loading state; call
    /// [`AuthContext::load_from_store`] once at startup.
    pub fn new(client: SessionClient) -> Self {
        let (state, _) = watch::channel(AuthContextData::default());
        let (notices, _) = broadcast::channel(32);

        let inner = Arc::new(Inner {
            client,
            state,
            notices,
        });
        inner.client.set_listener(Arc::new(ContextListener {
            inner: Arc::downgrade(&inner),
        }));

        Self { inner }
    }

    pub fn client(&self) -> &SessionClient {
        &self.inner.client
    }

    /// Current state
    pub fn snapshot(&self) -> AuthContextData {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<AuthContextData> {
        self.inner.state.subscribe()
    }

    /// User-visible notices raised by the request pipeline
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    /// Record a signed-in session, writing it through to the token store
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be written; state is left
    /// unchanged in that case
    pub async fn login(&self, token: impl Into<String>, role: Role) -> Result<(), AuthError> {
        let token = token.into();
        self.inner.client.token_store().save(&token, Some(role)).await?;
        self.inner.dispatch(AuthAction::Login { token, role });
        info!(%role, "Logged in");
        Ok(())
    }

    /// Sign in with credentials, then record the session and profile
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the credentials or the session
    /// cannot be stored
    pub async fn sign_in(&self, credentials: &LoginRequest) -> Result<(), AuthError> {
        let response = self.inner.client.sign_in(credentials).await?;
        self.login(response.token, response.role).await?;
        if let Some(user) = response.user {
            self.set_user(user);
        }
        Ok(())
    }

    /// End the session locally, notifying the server on a best-effort basis
    ///
    /// Returns the server's answer, or `None` if it could not be notified.
    ///
    /// # Errors
    ///
    /// Returns an error only if the token store cannot be cleared; the
    /// in-memory state is cleared regardless
    pub async fn logout(&self) -> Result<Option<LogoutResponse>, AuthError> {
        let acknowledged = match self.inner.client.notify_logout().await {
            Ok(response) => {
                if response.success {
                    let message = response.message.as_deref().unwrap_or("Signed out");
                    // Nobody listening for notices is fine
                    let _ = self.inner.notices.send(Notice::info(message));
                } else {
                    warn!(
                        "Server declined logout: {}",
                        response.message.as_deref().unwrap_or("no message")
                    );
                }
                Some(response)
            }
            Err(e) => {
                warn!("Failed to notify server of logout: {e}");
                None
            }
        };

        let cleared = self.inner.client.token_store().clear().await;
        self.inner.dispatch(AuthAction::Logout);
        info!("Logged out");

        cleared?;
        Ok(acknowledged)
    }

    /// Rehydrate state from the token store
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read; the context then leaves
    /// the loading state as unauthenticated
    pub async fn load_from_store(&self) -> Result<Session, AuthError> {
        match self.inner.client.token_store().read().await {
            Ok(stored) => {
                let session: Session = stored.clone().into();
                self.inner.dispatch(AuthAction::Hydrated(stored));
                debug!(
                    authenticated = session.is_authenticated(),
                    "Loaded session from store"
                );
                Ok(session)
            }
            Err(e) => {
                self.inner.dispatch(AuthAction::Hydrated(None));
                Err(e.into())
            }
        }
    }

    /// Cache the signed-in user's profile
    pub fn set_user(&self, user: AuthenticatedUser) {
        self.inner.dispatch(AuthAction::SetUser(user));
    }

    /// Fetch the profile through the client and cache it
    ///
    /// # Errors
    ///
    /// Returns the client error; auth failures have already been handled by
    /// the client by the time this returns
    pub async fn fetch_user(&self) -> Result<AuthenticatedUser, AuthError> {
        let user = self.inner.client.current_user().await?;
        self.set_user(user.clone());
        Ok(user)
    }

    /// Drop the session: clear the store and state, and raise the notice
    ///
    /// What happens next (navigation, a full reload) is up to the caller,
    /// which sees the reason in [`AuthContextData::last_reset`].
    pub async fn reset(&self, reason: ResetReason) {
        self.inner.client.reset_session(reason).await;
    }
}
