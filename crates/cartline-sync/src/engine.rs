//! # Cart Engine
//!
//! Owns the local cart replica for one session and keeps it in step with the
//! backend.
//!
//! ## Operation Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cart Engine Flow                                 │
//! │                                                                         │
//! │  caller ── add_item(item) ──►  1. CartOp applied to `current`          │
//! │                                   (under the state lock)               │
//! │                                2. op appended to `pending`, command    │
//! │                                   queued to the worker                 │
//! │                                3. Optimistic snapshot published        │
//! │                                                                         │
//! │  worker (one call at a time, FIFO)                                     │
//! │      ├── Ok(server cart)  ──► confirmed = server cart                  │
//! │      │                        pending head: Pending → Committed        │
//! │      │                        current = replay(pending, confirmed)     │
//! │      │                                                                  │
//! │      └── Err / timeout   ──► pending head: Pending → RolledBack        │
//! │          / panic             current = replay(pending, confirmed)      │
//! │                              error returned to the caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `current` is always `confirmed` with every still-pending edit replayed on
//! top. A rollback therefore never restores a stale snapshot: it rebuilds
//! from the last server-confirmed cart, so edits queued behind a failed one
//! keep their optimistic effect.
//!
//! ## Usage
//! ```rust,no_run
//! use cartline_core::{CartItem, Money};
//! use cartline_sync::{CartConfig, CartEngine};
//!
//! # async fn demo() -> cartline_sync::SyncResult<()> {
//! let engine = CartEngine::from_config(&CartConfig::load(None)?)?;
//! engine.subscribe(|snapshot: &cartline_sync::CartSnapshot| {
//!     println!("{:?} total={}", snapshot.phase, snapshot.cart.total());
//! });
//!
//! engine.hydrate().await?;
//! engine
//!     .add_item(CartItem::new("a", "flight", Money::from_cents(100)))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use cartline_core::{
    AddOn, AvailableAddOn, Cart, CartItem, CartOp, CartSummary, CartValidation, ItemPatch, Money,
    OpKind,
};

use crate::config::{CartConfig, EngineSettings};
use crate::error::{SyncError, SyncResult};
use crate::gateway::CartGateway;
use crate::http::HttpCartGateway;
use crate::observer::{CartObserver, CartSnapshot, ObserverRegistry, SnapshotPhase, SubscriptionId};

// =============================================================================
// Pending Operations
// =============================================================================

/// Lifecycle of one queued edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OpPhase {
    /// Applied locally, not yet answered by the backend.
    Pending,
    Committed,
    RolledBack,
}

/// Public view of a queued edit.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    #[ts(type = "string")]
    pub id: Uuid,
    pub kind: OpKind,
    pub item_id: Option<String>,
    pub phase: OpPhase,
    #[ts(type = "string")]
    pub issued_at: DateTime<Utc>,
}

struct PendingOp {
    id: Uuid,
    op: CartOp,
    phase: OpPhase,
    issued_at: DateTime<Utc>,
}

impl PendingOp {
    fn new(op: CartOp) -> Self {
        PendingOp {
            id: Uuid::new_v4(),
            op,
            phase: OpPhase::Pending,
            issued_at: Utc::now(),
        }
    }

    /// Moves the op out of `Pending`. Settled ops never change phase again.
    fn settle(mut self, phase: OpPhase) -> Self {
        debug_assert_eq!(self.phase, OpPhase::Pending);
        self.phase = phase;
        self
    }

    fn view(&self) -> PendingOperation {
        PendingOperation {
            id: self.id,
            kind: self.op.kind(),
            item_id: self.op.item_id().map(str::to_string),
            phase: self.phase,
            issued_at: self.issued_at,
        }
    }
}

// =============================================================================
// Engine State
// =============================================================================

struct Command {
    job: Job,
    reply: oneshot::Sender<SyncResult<Cart>>,
}

enum Job {
    Mutate { id: Uuid, op: CartOp },
    Refresh,
}

impl Job {
    fn kind(&self) -> OpKind {
        match self {
            Job::Mutate { op, .. } => op.kind(),
            Job::Refresh => OpKind::Hydrate,
        }
    }

    fn pending_id(&self) -> Option<Uuid> {
        match self {
            Job::Mutate { id, .. } => Some(*id),
            Job::Refresh => None,
        }
    }
}

struct EngineState {
    /// Last cart the backend confirmed.
    confirmed: Cart,
    /// `confirmed` plus every pending op, as shown to observers.
    current: Cart,
    pending: VecDeque<PendingOp>,
    revision: u64,
    /// Snapshots waiting for delivery, in revision order.
    outbox: VecDeque<CartSnapshot>,
    /// Dropped on shutdown so the worker drains and stops.
    commands: Option<mpsc::UnboundedSender<Command>>,
}

impl EngineState {
    /// Rebuilds `current` from `confirmed` and the pending queue.
    fn rebase(&mut self) {
        let mut cart = self.confirmed.clone();
        for pending in &self.pending {
            match pending.op.apply(&cart) {
                Ok(next) => cart = next,
                Err(e) => debug!(
                    op_id = %pending.id,
                    op = %pending.op.kind(),
                    error = %e,
                    "Pending op no longer applies locally, leaving it to the server"
                ),
            }
        }
        self.current = cart;
    }

    fn take_pending(&mut self, id: Uuid) -> Option<PendingOp> {
        let pos = self.pending.iter().position(|p| p.id == id)?;
        self.pending.remove(pos)
    }

    /// Bumps the revision and queues a snapshot of `current`.
    fn publish(&mut self, phase: SnapshotPhase, operation: Option<OpKind>, error: Option<String>) {
        self.revision += 1;
        self.outbox.push_back(CartSnapshot::new(
            self.revision,
            phase,
            operation,
            self.current.clone(),
            error,
        ));
    }
}

struct EngineInner {
    gateway: Arc<dyn CartGateway>,
    state: Mutex<EngineState>,
    /// Held by whichever thread is currently draining the outbox.
    delivery: Mutex<()>,
    observers: ObserverRegistry,
    disposed: AtomicBool,
    operation_timeout: Duration,
}

enum Queued {
    Ready(SyncResult<Cart>),
    Waiting(oneshot::Receiver<SyncResult<Cart>>),
}

// =============================================================================
// Cart Engine
// =============================================================================

/// Handle to a cart session. Cheap to clone; all clones share one cart.
#[derive(Clone)]
pub struct CartEngine {
    inner: Arc<EngineInner>,
}

impl CartEngine {
    /// Creates an engine with an empty cart and starts its worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(gateway: Arc<dyn CartGateway>, settings: &EngineSettings) -> Self {
        Self::with_operation_timeout(gateway, settings.operation_timeout())
    }

    pub fn with_operation_timeout(gateway: Arc<dyn CartGateway>, operation_timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let inner = Arc::new(EngineInner {
            gateway,
            state: Mutex::new(EngineState {
                confirmed: Cart::empty(),
                current: Cart::empty(),
                pending: VecDeque::new(),
                revision: 0,
                outbox: VecDeque::new(),
                commands: Some(tx),
            }),
            delivery: Mutex::new(()),
            observers: ObserverRegistry::new(),
            disposed: AtomicBool::new(false),
            operation_timeout,
        });

        tokio::spawn(run_worker(Arc::downgrade(&inner), rx));

        debug!(
            timeout_ms = u64::try_from(operation_timeout.as_millis()).unwrap_or(u64::MAX),
            "Cart engine started"
        );
        CartEngine { inner }
    }

    /// Builds an engine talking to the configured REST backend.
    pub fn from_config(config: &CartConfig) -> SyncResult<Self> {
        let gateway = HttpCartGateway::new(&config.gateway)?;
        Ok(Self::new(Arc::new(gateway), &config.engine))
    }

    // =========================================================================
    // Mutations
    // =========================================================================
    //
    // Each mutation applies optimistically when called, before the returned
    // future is first polled. The future resolves with the server-confirmed
    // cart, or with the error that rolled the edit back.

    pub fn add_item(&self, item: CartItem) -> impl Future<Output = SyncResult<Cart>> + Send + 'static {
        self.submit(CartOp::AddItem(item))
    }

    pub fn update_item(
        &self,
        item_id: impl Into<String>,
        patch: ItemPatch,
    ) -> impl Future<Output = SyncResult<Cart>> + Send + 'static {
        self.submit(CartOp::UpdateItem {
            item_id: item_id.into(),
            patch,
        })
    }

    /// Removing an item that is not in the cart resolves immediately with
    /// the unchanged cart and never reaches the backend.
    pub fn remove_item(
        &self,
        item_id: impl Into<String>,
    ) -> impl Future<Output = SyncResult<Cart>> + Send + 'static {
        self.submit(CartOp::RemoveItem {
            item_id: item_id.into(),
        })
    }

    pub fn add_add_on(
        &self,
        item_id: impl Into<String>,
        add_on: AddOn,
    ) -> impl Future<Output = SyncResult<Cart>> + Send + 'static {
        self.submit(CartOp::AddAddOn {
            item_id: item_id.into(),
            add_on,
        })
    }

    /// Same short-circuit as `remove_item` when the add-on is absent.
    pub fn remove_add_on(
        &self,
        item_id: impl Into<String>,
        add_on_id: impl Into<String>,
    ) -> impl Future<Output = SyncResult<Cart>> + Send + 'static {
        self.submit(CartOp::RemoveAddOn {
            item_id: item_id.into(),
            add_on_id: add_on_id.into(),
        })
    }

    pub fn clear_cart(&self) -> impl Future<Output = SyncResult<Cart>> + Send + 'static {
        self.submit(CartOp::Clear)
    }

    /// Replaces the local cart with the server's.
    ///
    /// Queued behind any in-flight edit; edits issued afterwards replay on
    /// top of the fetched cart.
    pub fn hydrate(&self) -> impl Future<Output = SyncResult<Cart>> + Send + 'static {
        let queued = self.enqueue_refresh();
        resolve(queued)
    }

    /// Drops the local cart without telling the backend (checkout done).
    ///
    /// Edits still in flight replay on top of the empty cart.
    pub fn discard(&self) -> SyncResult<()> {
        self.ensure_running()?;
        {
            let mut state = self.inner.lock_state();
            state.confirmed = Cart::empty();
            state.rebase();
            state.publish(SnapshotPhase::Discarded, None, None);
            info!(revision = state.revision, "Local cart discarded");
        }
        self.inner.deliver();
        Ok(())
    }

    // =========================================================================
    // Read-Through Calls
    // =========================================================================

    /// Asks the backend whether the cart can be checked out. Errors are
    /// relayed, not interpreted.
    pub async fn validate_cart(&self) -> SyncResult<CartValidation> {
        self.ensure_running()?;
        self.inner.bounded(self.inner.gateway.validate_cart()).await
    }

    /// The backend's priced summary. Its total includes taxes and fees and
    /// is unrelated to `total_amount()`.
    pub async fn cart_summary(&self) -> SyncResult<CartSummary> {
        self.ensure_running()?;
        self.inner.bounded(self.inner.gateway.get_cart_summary()).await
    }

    pub async fn available_add_ons(
        &self,
        item_type: &str,
        item_id: &str,
    ) -> SyncResult<Vec<AvailableAddOn>> {
        self.ensure_running()?;
        self.inner
            .bounded(self.inner.gateway.get_available_add_ons(item_type, item_id))
            .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn cart(&self) -> Cart {
        self.inner.lock_state().current.clone()
    }

    pub fn item_count(&self) -> usize {
        self.inner.lock_state().current.item_count()
    }

    pub fn total_amount(&self) -> Money {
        self.inner.lock_state().current.total()
    }

    /// Edits applied locally and still waiting for the backend, oldest first.
    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        self.inner
            .lock_state()
            .pending
            .iter()
            .map(PendingOp::view)
            .collect()
    }

    /// Revision of the latest published snapshot.
    pub fn revision(&self) -> u64 {
        self.inner.lock_state().revision
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.is_disposed()
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    pub fn subscribe(&self, observer: impl CartObserver + 'static) -> SubscriptionId {
        let id = self.inner.observers.subscribe(Arc::new(observer));
        debug!(subscription = %id, "Observer subscribed");
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observers.unsubscribe(id)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Ends the session.
    ///
    /// New edits fail with `ShuttingDown`. A call already in flight is left
    /// to finish but its answer is dropped; queued edits are never sent.
    pub fn shutdown(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut state = self.inner.lock_state();
        state.commands = None;
        info!(
            pending = state.pending.len(),
            revision = state.revision,
            "Cart engine shutting down"
        );
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_running(&self) -> SyncResult<()> {
        if self.inner.is_disposed() {
            Err(SyncError::ShuttingDown)
        } else {
            Ok(())
        }
    }

    fn submit(&self, op: CartOp) -> impl Future<Output = SyncResult<Cart>> + Send + 'static {
        let queued = self.enqueue(op);
        resolve(queued)
    }

    fn enqueue(&self, op: CartOp) -> Queued {
        let queued = {
            let mut state = self.inner.lock_state();
            let Some(commands) = state.commands.clone() else {
                return Queued::Ready(Err(SyncError::ShuttingDown));
            };

            if op.is_noop_on(&state.current) {
                debug!(op = %op.kind(), item_id = ?op.item_id(), "Removal target absent, nothing to send");
                return Queued::Ready(Ok(state.current.clone()));
            }

            let next = match op.apply(&state.current) {
                Ok(next) => next,
                Err(e) => return Queued::Ready(Err(e.into())),
            };

            let pending = PendingOp::new(op.clone());
            let (reply, rx) = oneshot::channel();
            let command = Command {
                job: Job::Mutate { id: pending.id, op },
                reply,
            };
            if commands.send(command).is_err() {
                return Queued::Ready(Err(SyncError::ChannelError(
                    "cart engine worker has stopped".into(),
                )));
            }

            let kind = pending.op.kind();
            debug!(
                op_id = %pending.id,
                op = %kind,
                item_id = ?pending.op.item_id(),
                total = %next.total(),
                "Applied optimistically"
            );
            state.current = next;
            state.pending.push_back(pending);
            state.publish(SnapshotPhase::Optimistic, Some(kind), None);
            Queued::Waiting(rx)
        };

        self.inner.deliver();
        queued
    }

    fn enqueue_refresh(&self) -> Queued {
        let state = self.inner.lock_state();
        let Some(commands) = state.commands.as_ref() else {
            return Queued::Ready(Err(SyncError::ShuttingDown));
        };
        let (reply, rx) = oneshot::channel();
        match commands.send(Command {
            job: Job::Refresh,
            reply,
        }) {
            Ok(()) => Queued::Waiting(rx),
            Err(_) => Queued::Ready(Err(SyncError::ChannelError(
                "cart engine worker has stopped".into(),
            ))),
        }
    }
}

fn resolve(queued: Queued) -> impl Future<Output = SyncResult<Cart>> + Send + 'static {
    async move {
        match queued {
            Queued::Ready(result) => result,
            // The worker dropped the reply: the engine went away mid-queue.
            Queued::Waiting(rx) => rx.await.unwrap_or(Err(SyncError::ShuttingDown)),
        }
    }
}

// =============================================================================
// Worker
// =============================================================================

async fn run_worker(inner: Weak<EngineInner>, mut commands: mpsc::UnboundedReceiver<Command>) {
    while let Some(Command { job, reply }) = commands.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let kind = job.kind();
        let pending_id = job.pending_id();

        // Each job runs on its own task so a panic fails that job only.
        let task = tokio::spawn({
            let inner = Arc::clone(&inner);
            async move { inner.run(job).await }
        });
        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(failure) => inner.recover(pending_id, kind, failure),
        };
        let _ = reply.send(outcome);
    }
    debug!("Cart engine worker stopped");
}

impl EngineInner {
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Runs one queued job to completion and publishes its outcome.
    async fn run(&self, job: Job) -> SyncResult<Cart> {
        if self.is_disposed() {
            return Err(SyncError::ShuttingDown);
        }

        let outcome = match job {
            Job::Mutate { id, op } => {
                debug!(op_id = %id, op = %op.kind(), item_id = ?op.item_id(), "Dispatching");
                let result = self.dispatch(&op).await;

                if self.is_disposed() {
                    debug!(op_id = %id, op = %op.kind(), "Engine shut down mid-call, dropping the answer");
                    return Err(SyncError::ShuttingDown);
                }

                match result.and_then(heal) {
                    Ok(server) => self.commit(id, op.kind(), server),
                    Err(e) => self.roll_back(id, op.kind(), e),
                }
            }
            Job::Refresh => {
                let result = self.bounded(self.gateway.get_cart()).await;

                if self.is_disposed() {
                    return Err(SyncError::ShuttingDown);
                }

                match result.and_then(heal) {
                    Ok(server) => self.hydrated(server),
                    Err(e) => {
                        warn!(error = %e, "Failed to fetch cart from server");
                        Err(e)
                    }
                }
            }
        };
        self.deliver();
        outcome
    }

    /// Settles a job whose task panicked or was cancelled.
    ///
    /// An edit that is still pending is rolled back like a failed call. A
    /// refresh leaves the local cart alone.
    fn recover(&self, pending_id: Option<Uuid>, kind: OpKind, failure: JoinError) -> SyncResult<Cart> {
        if self.is_disposed() {
            return Err(SyncError::ShuttingDown);
        }

        let cause = if failure.is_panic() {
            "panicked"
        } else {
            "was cancelled"
        };
        let error = SyncError::Internal(format!("{kind} handler {cause}"));
        error!(op = %kind, op_id = ?pending_id, error = %error, "Cart engine job failed");

        let still_pending = pending_id.filter(|id| self.lock_state().pending.iter().any(|p| p.id == *id));
        let outcome = match still_pending {
            Some(id) => self.roll_back(id, kind, error),
            None => Err(error),
        };
        self.deliver();
        outcome
    }

    /// Issues the gateway call matching `op`.
    async fn dispatch(&self, op: &CartOp) -> SyncResult<Cart> {
        let gateway = &self.gateway;
        let call = async {
            match op {
                CartOp::AddItem(item) => gateway.add_item(item.clone()).await,
                CartOp::UpdateItem { item_id, patch } => gateway.update_item(item_id, patch).await,
                CartOp::RemoveItem { item_id } => gateway.remove_item(item_id).await,
                CartOp::AddAddOn { item_id, add_on } => gateway.add_add_on(item_id, add_on).await,
                CartOp::RemoveAddOn { item_id, add_on_id } => {
                    gateway.remove_add_on(item_id, add_on_id).await
                }
                // Success confirms the empty state.
                CartOp::Clear => gateway.clear_cart().await.map(|()| Cart::empty()),
            }
        };
        self.bounded(call).await
    }

    async fn bounded<T>(&self, call: impl Future<Output = SyncResult<T>>) -> SyncResult<T> {
        match tokio::time::timeout(self.operation_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(
                u64::try_from(self.operation_timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    fn commit(&self, id: Uuid, kind: OpKind, server: Cart) -> SyncResult<Cart> {
        let mut state = self.lock_state();

        if let Some(settled) = state.take_pending(id).map(|p| p.settle(OpPhase::Committed)) {
            debug!(op_id = %settled.id, phase = ?settled.phase, "Operation settled");
        }
        state.confirmed = server.clone();
        state.rebase();
        state.publish(SnapshotPhase::Committed, Some(kind), None);

        info!(
            op_id = %id,
            op = %kind,
            revision = state.revision,
            total = %state.current.total(),
            still_pending = state.pending.len(),
            "Server confirmed"
        );
        Ok(server)
    }

    fn roll_back(&self, id: Uuid, kind: OpKind, error: SyncError) -> SyncResult<Cart> {
        let mut state = self.lock_state();

        if let Some(settled) = state.take_pending(id).map(|p| p.settle(OpPhase::RolledBack)) {
            debug!(op_id = %settled.id, phase = ?settled.phase, "Operation settled");
        }
        state.rebase();
        state.publish(SnapshotPhase::RolledBack, Some(kind), Some(error.to_string()));

        warn!(
            op_id = %id,
            op = %kind,
            revision = state.revision,
            retryable = error.is_retryable(),
            error = %error,
            "Rolled back"
        );
        Err(error)
    }

    fn hydrated(&self, server: Cart) -> SyncResult<Cart> {
        let mut state = self.lock_state();

        state.confirmed = server;
        state.rebase();
        state.publish(SnapshotPhase::Hydrated, Some(OpKind::Hydrate), None);

        info!(
            revision = state.revision,
            items = state.current.item_count(),
            total = %state.current.total(),
            "Cart hydrated from server"
        );
        Ok(state.current.clone())
    }

    /// Drains the outbox to observers.
    ///
    /// Only one thread delivers at a time; a thread that finds delivery busy
    /// leaves its snapshots to the current deliverer. The state lock is never
    /// held while an observer runs, so observers may read the engine.
    fn deliver(&self) {
        loop {
            let guard = match self.delivery.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };

            loop {
                let next = self.lock_state().outbox.pop_front();
                let Some(snapshot) = next else {
                    break;
                };
                self.observers.notify(&snapshot);
            }
            drop(guard);

            // Snapshots queued while we were releasing the guard.
            let drained = self.lock_state().outbox.is_empty();
            if drained {
                return;
            }
        }
    }
}

/// Server truth wins, but a total that contradicts its own items is
/// recomputed. A cart whose items cannot be totalled at all is refused.
fn heal(server: Cart) -> SyncResult<Cart> {
    if server.is_consistent() {
        return Ok(server);
    }
    match server.recomputed_total() {
        Ok(healed) => {
            warn!(
                reported = %server.total(),
                derived = %healed.total(),
                "Server cart total does not match its items, recomputing"
            );
            Ok(healed)
        }
        Err(e) => {
            warn!(
                reported = %server.total(),
                items = server.item_count(),
                error = %e,
                "Server cart cannot be totalled, refusing it"
            );
            Err(SyncError::Decode(format!("server cart unusable: {e}")))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
