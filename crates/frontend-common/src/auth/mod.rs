//! Authentication module

pub mod context;
pub mod error;
pub mod guard;

// Re-export commonly used items
pub use context::{AuthAction, AuthContext, AuthContextData};
pub use error::AuthError;
pub use guard::{Access, GuardDecision, GuardWatch, RouteGuard};
