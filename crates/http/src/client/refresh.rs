//! Coalescing of token renewals
//!
//! Every renewal runs under one async lock. Requests note the renewal epoch
//! before they are sent; when one of them hits a 401 it asks the
//! coordinator for a renewal at that epoch. If the epoch has moved on, a
//! renewal finished while the request was in flight and its outcome (now in
//! the token store) is reused instead of starting another one.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Refresh protocol state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Normal,
    Refreshing,
}

/// Result of asking for a renewal
#[derive(Debug, PartialEq, Eq)]
pub enum Renewal<T> {
    /// This caller ran the renewal
    Ran(T),
    /// Another renewal completed since the caller's epoch
    Joined,
}

/// Serializes renewals and tracks how many have completed
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    lock: Mutex<()>,
    epoch: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of renewals attempted so far; capture before dispatching
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn state(&self) -> RefreshState {
        if self.lock.try_lock().is_ok() {
            RefreshState::Normal
        } else {
            RefreshState::Refreshing
        }
    }

    /// Run `renew` unless a renewal already completed after `seen_epoch`
    ///
    /// Callers arriving while a renewal is in flight queue on the lock and
    /// then observe the bumped epoch. The epoch advances whether or not the
    /// renewal succeeds, so a failed renewal is never retried by waiters.
    pub async fn renew<F, Fut, T>(&self, seen_epoch: u64, renew: F) -> Renewal<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.lock.lock().await;

        if self.epoch() != seen_epoch {
            return Renewal::Joined;
        }

        let outcome = renew().await;
        self.epoch.fetch_add(1, Ordering::AcqRel);
        Renewal::Ran(outcome)
    }
}
