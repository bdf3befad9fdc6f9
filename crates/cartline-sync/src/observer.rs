//! # Cart Observers
//!
//! Subscription list for UI components that render the cart.
//!
//! ## Delivery
//! ```text
//! revision:   1            2            3             4
//!             Optimistic ─► Optimistic ─► Committed ─► RolledBack
//!                │             │             │             │
//! observer A ◄───┤◄────────────┤◄────────────┤◄────────────┤
//! observer B ◄───┘◄────────────┘◄────────────┘◄────────────┘
//! ```
//! Every snapshot reaches every observer in subscription order, and
//! snapshots arrive in revision order. Observers run synchronously on the
//! publishing thread and must not mutate the engine from `on_change`. An
//! observer that panics is logged and skipped; the others still run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::error;
use ts_rs::TS;

use cartline_core::{Cart, OpKind};

// =============================================================================
// Snapshots
// =============================================================================

/// Why a snapshot was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotPhase {
    /// The server's cart replaced the local one (session start / refresh).
    Hydrated,
    /// A local edit was applied ahead of the server.
    Optimistic,
    /// The server accepted an edit; `cart` is server truth plus any edits
    /// still in flight.
    Committed,
    /// The server refused an edit, or it never answered. `error` says why.
    RolledBack,
    /// The local cart was dropped without a remote call.
    Discarded,
}

/// Immutable view of the cart handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    /// Strictly increasing per engine.
    #[ts(type = "number")]
    pub revision: u64,
    pub phase: SnapshotPhase,
    pub operation: Option<OpKind>,
    pub cart: Cart,
    pub error: Option<String>,
    #[ts(type = "string")]
    pub at: DateTime<Utc>,
}

impl CartSnapshot {
    pub fn new(
        revision: u64,
        phase: SnapshotPhase,
        operation: Option<OpKind>,
        cart: Cart,
        error: Option<String>,
    ) -> Self {
        CartSnapshot {
            revision,
            phase,
            operation,
            cart,
            error,
            at: Utc::now(),
        }
    }
}

// =============================================================================
// Observer Trait
// =============================================================================

/// Receives every published snapshot.
pub trait CartObserver: Send + Sync {
    fn on_change(&self, snapshot: &CartSnapshot);
}

impl<F> CartObserver for F
where
    F: Fn(&CartSnapshot) + Send + Sync,
{
    fn on_change(&self, snapshot: &CartSnapshot) {
        self(snapshot)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Ordered list of subscribed observers.
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: AtomicU64,
    observers: Mutex<Vec<(SubscriptionId, Arc<dyn CartObserver>)>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn CartObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, observer));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.lock();
        let before = observers.len();
        observers.retain(|(sub, _)| *sub != id);
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls every observer in subscription order.
    ///
    /// The list is copied first, so an observer may unsubscribe itself.
    pub fn notify(&self, snapshot: &CartSnapshot) {
        let observers: Vec<(SubscriptionId, Arc<dyn CartObserver>)> = self
            .lock()
            .iter()
            .map(|(id, o)| (*id, Arc::clone(o)))
            .collect();
        for (id, observer) in observers {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| observer.on_change(snapshot)));
            if let Err(payload) = delivered {
                error!(
                    subscription = %id,
                    revision = snapshot.revision,
                    panic = panic_message(payload.as_ref()),
                    "Observer panicked"
                );
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Arc<dyn CartObserver>)>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
