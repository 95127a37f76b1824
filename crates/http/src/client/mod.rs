//! Tutora HTTP client
//!
//! [`SessionClient`] is the only place that knows about tokens. It reads the
//! bearer token from the [`TokenStore`] for every dispatch, renews it once on
//! a 401 (coalescing concurrent renewals), and clears the session on a 403
//! or a failed renewal. Callers only ever see typed results.

pub mod auth;
pub mod error;
pub mod listener;
pub mod refresh;
pub mod request;
pub mod store;

use error::ClientError;
use listener::{Notice, ResetReason, SessionListener};
use refresh::{RefreshCoordinator, RefreshState, Renewal};
use request::PendingRequest;
use reqwest::{Client, ClientBuilder, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use store::{MemoryTokenStore, TokenStore};
use tracing::{debug, error, info, warn};
use tutora_core::{ClientSettings, EndpointConfig, StoredSession};

use crate::types::{ErrorBody, RefreshResponse};

/// Authenticated request client
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    base_url: String,
    endpoints: EndpointConfig,
    store: Arc<dyn TokenStore>,
    refresh: RefreshCoordinator,
    listener: RwLock<Option<Arc<dyn SessionListener>>>,
}

impl SessionClient {
    /// Create a client with an in-memory token store
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a client from loaded settings
    pub fn from_settings(
        settings: &ClientSettings,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, ClientError> {
        Self::builder()
            .settings(settings)
            .token_store(store)
            .build()
    }

    /// Create a new client builder
    pub fn builder() -> SessionClientBuilder {
        SessionClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn endpoints(&self) -> &EndpointConfig {
        &self.inner.endpoints
    }

    /// The store shared with the session state
    pub fn token_store(&self) -> Arc<dyn TokenStore> {
        self.inner.store.clone()
    }

    /// Whether a token renewal is currently in flight
    pub fn refresh_state(&self) -> RefreshState {
        self.inner.refresh.state()
    }

    /// Register the receiver of notices and session resets
    pub fn set_listener(&self, listener: Arc<dyn SessionListener>) {
        if let Ok(mut slot) = self.inner.listener.write() {
            *slot = Some(listener);
        }
    }

    /// Remove the registered listener
    pub fn clear_listener(&self) {
        if let Ok(mut slot) = self.inner.listener.write() {
            *slot = None;
        }
    }

    /// GET `path` and decode the response
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(PendingRequest::get(path)).await
    }

    /// POST a JSON body to `path` and decode the response
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(PendingRequest::post(path).json(body)?).await
    }

    /// PUT a JSON body to `path` and decode the response
    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(PendingRequest::put(path).json(body)?).await
    }

    /// PATCH `path` with a JSON body and decode the response
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(PendingRequest::patch(path).json(body)?).await
    }

    /// DELETE `path` and decode the response
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(PendingRequest::delete(path)).await
    }

    /// Send a request through the session pipeline
    ///
    /// A 401 triggers at most one token renewal followed by one retry. A 403
    /// or a failed renewal clears the session before the error is returned.
    pub async fn send<T: DeserializeOwned>(
        &self,
        mut request: PendingRequest,
    ) -> Result<T, ClientError> {
        loop {
            let epoch = self.inner.refresh.epoch();
            let token = self.current_token().await?;

            let response = match self.dispatch(&request, token.as_deref()).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("{} {} failed: {e}", request.method, request.path);
                    self.notify(&Notice::error(Notice::NETWORK_FAILURE));
                    return Err(e);
                }
            };

            let status = response.status();
            if status.is_success() {
                return decode(response).await;
            }

            let message = error_message(response).await;
            match status {
                StatusCode::UNAUTHORIZED if !request.is_retried() => {
                    debug!(
                        "{} {} returned 401, renewing session",
                        request.method, request.path
                    );
                    self.renew_session(epoch).await?;
                    request.mark_retried();
                }
                StatusCode::FORBIDDEN => {
                    warn!("{} {} returned 403", request.method, request.path);
                    self.reset_session(ResetReason::AccessDenied).await;
                    return Err(ClientError::Forbidden(message));
                }
                _ => {
                    debug!(
                        "{} {} returned {status}: {message}",
                        request.method, request.path
                    );
                    self.notify(&Notice::error(message.clone()));
                    return Err(ClientError::from_status(status, message));
                }
            }
        }
    }

    /// Send a request outside the session pipeline
    ///
    /// No renewal and no session reset happen here; error statuses are
    /// mapped and surfaced as notices.
    pub(crate) async fn send_plain<T: DeserializeOwned>(
        &self,
        request: &PendingRequest,
        with_token: bool,
    ) -> Result<T, ClientError> {
        let token = if with_token {
            self.current_token().await?
        } else {
            None
        };

        let response = match self.dispatch(request, token.as_deref()).await {
            Ok(response) => response,
            Err(e) => {
                self.notify(&Notice::error(Notice::NETWORK_FAILURE));
                return Err(e);
            }
        };

        let status = response.status();
        if status.is_success() {
            decode(response).await
        } else {
            let message = error_message(response).await;
            self.notify(&Notice::error(message.clone()));
            Err(ClientError::from_status(status, message))
        }
    }

    /// Clear the stored session and tell the listener why
    pub async fn reset_session(&self, reason: ResetReason) {
        if let Err(e) = self.inner.store.clear().await {
            error!("Failed to clear token store: {e}");
        }

        let listener = self.listener();
        if let Some(listener) = listener {
            listener.on_session_reset(reason);
            listener.on_notice(&reason.notice());
        }
    }

    async fn current_token(&self) -> Result<Option<String>, ClientError> {
        Ok(self.inner.store.read().await?.map(|s| s.token))
    }

    /// Renew the token once, or reuse a renewal that finished meanwhile
    async fn renew_session(&self, seen_epoch: u64) -> Result<(), ClientError> {
        let renewal = self
            .inner
            .refresh
            .renew(seen_epoch, || self.run_renewal())
            .await;

        match renewal {
            Renewal::Ran(outcome) => outcome,
            Renewal::Joined => {
                if self.current_token().await?.is_some() {
                    Ok(())
                } else {
                    Err(ClientError::SessionExpired)
                }
            }
        }
    }

    async fn run_renewal(&self) -> Result<(), ClientError> {
        match self.request_new_token().await {
            Ok(token) => {
                let role = self.inner.store.read().await?.and_then(|s| s.role);
                self.inner.store.save(&token, role).await?;
                info!("Session token renewed");

                if let Some(listener) = self.listener() {
                    listener.on_session_renewed(&StoredSession::new(token, role));
                }
                Ok(())
            }
            Err(e) => {
                warn!("Session renewal failed: {e}");
                self.reset_session(ResetReason::SessionExpired).await;
                Err(ClientError::SessionExpired)
            }
        }
    }

    async fn request_new_token(&self) -> Result<String, ClientError> {
        let request = PendingRequest::post(self.inner.endpoints.refresh.clone());
        let builder = self.request_builder(&request, None);

        // Native clients carry the refresh cookie in the shared cookie store
        #[cfg(target_arch = "wasm32")]
        let builder = builder.fetch_credentials_include();

        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(ClientError::from_status(status, message));
        }

        let body: RefreshResponse = decode(response).await?;
        Ok(body.token)
    }

    async fn dispatch(
        &self,
        request: &PendingRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        Ok(self.request_builder(request, token).send().await?)
    }

    fn request_builder(
        &self,
        request: &PendingRequest,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.inner.base_url, request.path);
        let mut builder = self
            .inner
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());

        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder
    }

    fn listener(&self) -> Option<Arc<dyn SessionListener>> {
        self.inner
            .listener
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().cloned())
    }

    fn notify(&self, notice: &Notice) {
        if let Some(listener) = self.listener() {
            listener.on_notice(notice);
        }
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        // Empty bodies decode like JSON null so `()` and `Option<_>` work
        return Ok(serde_json::from_slice(b"null")?);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ErrorBody::message_from(&body, status)
}

/// Builder for [`SessionClient`]
#[derive(Default)]
pub struct SessionClientBuilder {
    base_url: Option<String>,
    endpoints: Option<EndpointConfig>,
    store: Option<Arc<dyn TokenStore>>,
    listener: Option<Arc<dyn SessionListener>>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl SessionClientBuilder {
    /// Take base URL, endpoints, timeout and user agent from settings
    pub fn settings(mut self, settings: &ClientSettings) -> Self {
        self.base_url = Some(settings.base_url().to_string());
        self.endpoints = Some(settings.endpoints.clone());
        self.timeout = Some(Duration::from_secs(settings.timeout_secs));
        self.user_agent = Some(settings.user_agent.clone());
        self
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn endpoints(mut self, endpoints: EndpointConfig) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Set the token store (defaults to an in-memory store)
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client
    pub fn build(self) -> Result<SessionClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ClientError::Configuration("base_url is empty".into()));
        }

        let mut client_builder = ClientBuilder::new();

        #[cfg(not(target_arch = "wasm32"))]
        {
            client_builder = client_builder.cookie_store(true);
            if let Some(timeout) = self.timeout {
                client_builder = client_builder.timeout(timeout);
            }
        }

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("tutora-client/{}", env!("CARGO_PKG_VERSION")));
        client_builder = client_builder.user_agent(user_agent);

        let client = client_builder.build()?;

        Ok(SessionClient {
            inner: Arc::new(Inner {
                client,
                base_url,
                endpoints: self.endpoints.unwrap_or_default(),
                store: self
                    .store
                    .unwrap_or_else(|| Arc::new(MemoryTokenStore::new())),
                refresh: RefreshCoordinator::new(),
                listener: RwLock::new(self.listener),
            }),
        })
    }
}
