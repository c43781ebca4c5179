//! In-process fan-out of sensor updates to many listeners.
//!
//! One producer (the driver) calls [`EventHub::broadcast`]; any number of
//! consumers hold a [`Subscription`]. Every subscriber owns a bounded mailbox of
//! [`MAILBOX_CAPACITY`] pending updates:
//!
//! - A new subscription immediately receives the accumulated [`Snapshot`], so a
//!   freshly attached dashboard is never blank.
//! - Broadcasts never block. When a mailbox is full the update is dropped for
//!   that subscriber only; the next broadcast tries again.
//! - Cancelling (or dropping) a subscription closes its mailbox; a task blocked
//!   in [`Subscription::recv`] observes `None`.
//!
//! ```rust
//! use huskki::{EventHub, Value, update};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let hub = EventHub::new();
//! hub.broadcast(update([("rpm", 5000)]));
//!
//! let mut sub = hub.subscribe();
//! hub.broadcast(update([("tps", 50)]));
//!
//! // Snapshot first, then live updates.
//! assert_eq!(sub.recv().await.unwrap()["rpm"], Value::Int(5000));
//! assert_eq!(sub.recv().await.unwrap()["tps"], Value::Int(50));
//! # }
//! ```

use futures::Stream;
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

use crate::{Snapshot, Update};

/// Pending updates a subscriber may hold before new ones are dropped.
pub const MAILBOX_CAPACITY: usize = 16;

/// Identifies one subscription for the lifetime of its hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Default)]
struct HubState {
    subscribers: HashMap<SubscriptionId, mpsc::Sender<Update>>,
    next_id: u64,
    snapshot: Snapshot,
    dropped: u64,
}

/// Cheaply cloneable handle to a shared hub.
#[derive(Clone, Default)]
pub struct EventHub {
    inner: Arc<Mutex<HubState>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Never fails.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);

        let mut state = self.lock();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;

        if !state.snapshot.is_empty() {
            // Fresh mailbox, cannot be full.
            let _ = tx.try_send(state.snapshot.clone());
        }
        state.subscribers.insert(id, tx);
        debug!(%id, subscribers = state.subscribers.len(), "Subscribed");
        drop(state);

        Subscription { id, receiver: rx, handle: CancelHandle { id, hub: Arc::downgrade(&self.inner) } }
    }

    /// Merge `update` into the snapshot and offer it to every subscriber.
    pub fn broadcast(&self, update: Update) {
        let mut guard = self.lock();
        let HubState { subscribers, snapshot, dropped, .. } = &mut *guard;

        for (name, value) in &update {
            snapshot.insert(name.clone(), value.clone());
        }

        subscribers.retain(|id, tx| match tx.try_send(update.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                *dropped += 1;
                trace!(%id, "Mailbox full, dropping update");
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!(%id, "Subscriber went away, removing");
                false
            }
        });
    }

    /// Copy of the latest value for every name broadcast so far.
    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Updates discarded because a mailbox was full, across all subscribers.
    pub fn dropped_updates(&self) -> u64 {
        self.lock().dropped
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        lock_state(&self.inner)
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("EventHub")
            .field("subscribers", &state.subscribers.len())
            .field("snapshot_keys", &state.snapshot.len())
            .finish()
    }
}

fn lock_state(state: &Mutex<HubState>) -> MutexGuard<'_, HubState> {
    // Sends are non-blocking and map merges cannot panic midway, so a poisoned
    // lock still guards consistent state.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cancels one subscription. Cloneable, idempotent, safe to call from any task.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    id: SubscriptionId,
    hub: Weak<Mutex<HubState>>,
}

impl CancelHandle {
    /// Remove the subscriber and close its mailbox.
    pub fn cancel(&self) {
        let Some(inner) = self.hub.upgrade() else {
            return;
        };
        let mut state = lock_state(&inner);
        if state.subscribers.remove(&self.id).is_some() {
            debug!(id = %self.id, subscribers = state.subscribers.len(), "Unsubscribed");
        }
    }
}

/// One listener's mailbox.
///
/// Dropping the subscription cancels it. It can also be consumed as a
/// [`Stream`] of updates.
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::Receiver<Update>,
    handle: CancelHandle,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next update, or `None` once cancelled and drained.
    pub async fn recv(&mut self) -> Option<Update> {
        self.receiver.recv().await
    }

    /// Next update if one is already queued.
    pub fn try_recv(&mut self) -> Option<Update> {
        self.receiver.try_recv().ok()
    }

    /// Handle that cancels this subscription from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }
}

impl Stream for Subscription {
    type Item = Update;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
