//! Services built on the auth context

pub mod notifications;

pub use notifications::{NotificationConnect, NotificationService};
