//! Route guards for the student, tutor and admin areas

use super::context::AuthContextData;
use tokio::sync::watch;
use tutora_core::{Role, SignInRoutes};

/// What a protected page requires of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Any signed-in session, whatever its role
    AnyAuthenticated,
    /// A session with exactly this role
    Role(Role),
}

/// Outcome of a guard evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// The stored session has not been loaded yet; render nothing protected
    Pending,
    Allow,
    /// Navigate to this sign-in route instead
    Redirect(String),
}

/// Guard for the pages of one area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    area: Role,
    access: Access,
    sign_in: String,
}

impl RouteGuard {
    pub fn new(area: Role, access: Access, routes: &SignInRoutes) -> Self {
        Self {
            area,
            access,
            sign_in: routes.for_area(area).to_string(),
        }
    }

    /// Guard admitting only sessions whose role is the area's own
    pub fn for_area(area: Role, routes: &SignInRoutes) -> Self {
        Self::new(area, Access::Role(area), routes)
    }

    pub const fn area(&self) -> Role {
        self.area
    }

    pub const fn access(&self) -> Access {
        self.access
    }

    /// Decide whether protected content may render for `state`
    pub fn evaluate(&self, state: &AuthContextData) -> GuardDecision {
        if state.is_loading {
            return GuardDecision::Pending;
        }

        if !state.is_authenticated() {
            return GuardDecision::Redirect(self.sign_in.clone());
        }

        match self.access {
            Access::AnyAuthenticated => GuardDecision::Allow,
            Access::Role(required) if state.role() == Some(required) => GuardDecision::Allow,
            Access::Role(_) => GuardDecision::Redirect(self.sign_in.clone()),
        }
    }

    /// Follow state changes, re-evaluating on each one
    pub fn watch(&self, receiver: watch::Receiver<AuthContextData>) -> GuardWatch {
        GuardWatch {
            guard: self.clone(),
            receiver,
        }
    }
}

/// Guard bound to a live auth state
pub struct GuardWatch {
    guard: RouteGuard,
    receiver: watch::Receiver<AuthContextData>,
}

impl GuardWatch {
    /// Decision for the latest state
    pub fn current(&mut self) -> GuardDecision {
        let state = self.receiver.borrow_and_update();
        self.guard.evaluate(&state)
    }

    /// Wait for the next state change and evaluate it
    ///
    /// Returns `None` once the auth context has been dropped.
    pub async fn changed(&mut self) -> Option<GuardDecision> {
        self.receiver.changed().await.ok()?;
        Some(self.current())
    }
}
