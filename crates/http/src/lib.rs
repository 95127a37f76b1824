//! Tutora HTTP session layer
//!
//! Authenticated request client, token storage, the refresh-on-401
//! protocol and the chat notification protocol.

pub mod client;
pub mod notifications;
pub mod types;

pub use client::error::ClientError;
pub use client::listener::{Notice, NoticeLevel, ResetReason, SessionListener};
pub use client::refresh::RefreshState;
pub use client::request::PendingRequest;
#[cfg(not(target_arch = "wasm32"))]
pub use client::store::FileTokenStore;
pub use client::store::{MemoryTokenStore, StoreError, TokenStore};
pub use client::{SessionClient, SessionClientBuilder};
