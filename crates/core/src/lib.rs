//! Tutora core types and utilities

pub mod config;
pub mod error;
#[cfg(all(feature = "tracing", not(target_arch = "wasm32")))]
pub mod tracing;
pub mod types;

pub use config::{ClientSettings, EndpointConfig, Environment, SignInRoutes};
pub use error::{CoreError, CoreResult};
pub use types::{AuthenticatedUser, Role, Session, StoredSession};
