//! Session state shared by Tutora front-ends

pub mod auth;
pub mod services;

pub use auth::{
    Access, AuthAction, AuthContext, AuthContextData, AuthError, GuardDecision, RouteGuard,
};
pub use services::{NotificationConnect, NotificationService};
