//! Change fan-out for favorites subscribers.
//!
//! DESIGN
//! ======
//! Events go through a FIFO queue drained by one caller at a time. Whoever
//! enqueues while nobody is draining becomes the drainer and delivers until
//! the queue is empty; everyone else just enqueues and returns. Listeners
//! therefore run outside every lock, may call back into the favorites core,
//! and all subscribers observe events in one global order.
//!
//! Events are enqueued by the core while it still holds its state lock, so
//! queue order equals commit order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::set::{FavoriteSet, ProductId};

/// Why the favorites set changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    /// Snapshot delivered on subscription.
    Initial,
    Added(ProductId),
    Removed(ProductId),
    /// Replaced wholesale by an authoritative server list.
    ServerReplaced,
    /// Unioned with a server list.
    ServerMerged,
    Cleared,
    /// Reloaded after another context wrote the persisted list.
    ExternalReload,
    /// A remote acknowledgement disagreed with the optimistic state.
    ServerCorrected(ProductId),
}

/// Tagged "favorites changed" event carrying an immutable snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoritesChanged {
    /// Commit counter of the core; strictly increasing across changes.
    pub version: u64,
    pub favorites: FavoriteSet,
    pub cause: ChangeCause,
}

pub type Listener = Arc<dyn Fn(&FavoritesChanged) + Send + Sync>;

type ListenerId = u64;

struct Delivery {
    // `None` broadcasts; `Some` is an initial snapshot for one listener.
    target: Option<ListenerId>,
    event: FavoritesChanged,
}

#[derive(Default)]
struct EmitterInner {
    next_id: ListenerId,
    listeners: Vec<(ListenerId, Listener)>,
    queue: VecDeque<Delivery>,
    draining: bool,
}

#[derive(Default)]
pub struct Emitter {
    inner: Mutex<EmitterInner>,
}

impl Emitter {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, EmitterInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `listener` and queue `initial` for it alone.
    ///
    /// Call [`Emitter::flush`] afterwards to deliver.
    pub(crate) fn register(self: &Arc<Self>, listener: Listener, initial: FavoritesChanged) -> Subscription {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, listener));
        inner.queue.push_back(Delivery { target: Some(id), event: initial });
        Subscription { emitter: Arc::downgrade(self), id }
    }

    /// Queue `event` for every listener registered at delivery time.
    pub(crate) fn enqueue(&self, event: FavoritesChanged) {
        self.lock().queue.push_back(Delivery { target: None, event });
    }

    /// Deliver queued events unless another caller is already draining.
    pub(crate) fn flush(&self) {
        {
            let mut inner = self.lock();
            if inner.draining {
                return;
            }
            inner.draining = true;
        }
        let mut guard = DrainGuard { emitter: self, armed: true };

        loop {
            let (targets, event) = {
                let mut inner = self.lock();
                let Some(delivery) = inner.queue.pop_front() else {
                    // Cleared under the same lock that saw the empty queue, so
                    // a concurrent enqueue either lands before this check or
                    // finds `draining == false` and drains itself.
                    inner.draining = false;
                    guard.armed = false;
                    return;
                };
                let targets: Vec<Listener> = inner
                    .listeners
                    .iter()
                    .filter(|(id, _)| delivery.target.map_or(true, |t| t == *id))
                    .map(|(_, l)| Arc::clone(l))
                    .collect();
                (targets, delivery.event)
            };
            for listener in targets {
                listener(&event);
            }
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn remove(&self, id: ListenerId) {
        let mut inner = self.lock();
        inner.listeners.retain(|(lid, _)| *lid != id);
        inner.queue.retain(|d| d.target != Some(id));
    }
}

// Clears the draining flag if a listener panics mid-drain.
struct DrainGuard<'a> {
    emitter: &'a Emitter,
    armed: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.emitter.lock().draining = false;
        }
    }
}

/// Handle returned by `add_listener`. Dropping it unsubscribes.
///
/// Holds only a weak reference, so unsubscribing after the core is gone is a
/// no-op rather than a use-after-free or a leak.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    emitter: Weak<Emitter>,
    id: ListenerId,
}

impl Subscription {
    /// Deregister the listener. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        if let Some(emitter) = self.emitter.upgrade() {
            emitter.remove(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
#[path = "emitter_test.rs"]
mod tests;
