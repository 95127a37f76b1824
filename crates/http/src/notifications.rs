//! Chat notification protocol
//!
//! The socket itself is provided by the embedding front-end through
//! [`NotificationTransport`]. This module owns the wire format: the
//! connection URL (token in the query string), the `register` frame sent
//! after connecting, and decoding of `notification` frames, which are fanned
//! out to subscribers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

/// Notification channel errors
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Invalid socket URL: {0}")]
    InvalidUrl(String),

    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Which kind of chat participant a socket belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    Student,
    Tutor,
}

/// Sent once after connecting so the server can route notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    #[serde(rename = "type")]
    pub kind: ParticipantKind,
    pub id: String,
}

/// A new chat message addressed to this participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatNotification {
    pub chat_id: String,
    pub sender_type: ParticipantKind,
    pub sender_id: String,
    pub message: String,
}

/// Known socket events, framed as `{"event": ..., "data": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum SocketEvent {
    Register(Registration),
    Notification(ChatNotification),
}

#[derive(Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: JsonValue,
}

impl SocketEvent {
    /// Encode as a text frame
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized
    pub fn encode(&self) -> Result<String, NotificationError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a text frame; `Ok(None)` for events this client ignores
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not JSON or a known event carries
    /// an invalid payload
    pub fn decode(frame: &str) -> Result<Option<Self>, NotificationError> {
        let raw: RawFrame = serde_json::from_str(frame)?;
        let event = match raw.event.as_str() {
            "register" => Self::Register(serde_json::from_value(raw.data)?),
            "notification" => Self::Notification(serde_json::from_value(raw.data)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Socket URL for `base_url`, authenticated with `token`
///
/// `socket_path` is joined onto the path of `base_url`.
///
/// # Errors
///
/// Returns an error if the base URL cannot be parsed or is not http(s)/ws(s)
pub fn socket_url(base_url: &str, socket_path: &str, token: &str) -> Result<Url, NotificationError> {
    let mut url = Url::parse(base_url).map_err(|e| NotificationError::InvalidUrl(e.to_string()))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(NotificationError::InvalidUrl(format!(
                "unsupported scheme {other}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| NotificationError::InvalidUrl(format!("cannot use scheme {scheme}")))?;

    // Relative to the API base, like every HTTP endpoint
    let path = format!("{}{socket_path}", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(None);
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}

/// Bidirectional text-frame socket supplied by the front-end
#[async_trait]
pub trait NotificationTransport: Send {
    /// Send one text frame
    async fn send(&mut self, frame: String) -> Result<(), NotificationError>;

    /// Next text frame, or `None` once the connection is closed
    async fn next_frame(&mut self) -> Option<Result<String, NotificationError>>;
}

/// Fans incoming chat notifications out to subscribers
#[derive(Debug, Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<ChatNotification>,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl NotificationHub {
    /// Hub buffering up to `capacity` undelivered notifications per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatNotification> {
        self.sender.subscribe()
    }

    /// Register on `transport` and forward notifications until it closes
    ///
    /// Malformed frames and unknown events are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if registration cannot be sent or the transport fails
    pub async fn run<T: NotificationTransport>(
        &self,
        mut transport: T,
        registration: Registration,
    ) -> Result<(), NotificationError> {
        let id = registration.id.clone();
        transport
            .send(SocketEvent::Register(registration).encode()?)
            .await?;
        info!("Registered for chat notifications as {id}");

        while let Some(frame) = transport.next_frame().await {
            match SocketEvent::decode(&frame?) {
                Ok(Some(SocketEvent::Notification(notification))) => {
                    debug!("Notification for chat {}", notification.chat_id);
                    // No subscribers is fine; the notification is dropped
                    let _ = self.sender.send(notification);
                }
                Ok(Some(SocketEvent::Register(_))) | Ok(None) => {}
                Err(e) => warn!("Skipping notification frame: {e}"),
            }
        }

        debug!("Notification transport closed");
        Ok(())
    }
}
