//! Favorites core: the single authority over the local favorites set.
//!
//! DESIGN
//! ======
//! One `FavoritesManager` is constructed by the application root and shared
//! through `Arc`. Every mutation runs as one critical section that updates
//! the in-memory set, writes it through to storage, bumps the version and
//! queues a change event; delivery happens after the lock is released.
//!
//! Remote confirmation is tracked per product with tickets. The optimistic
//! local change is never rolled back; a remote acknowledgement may only
//! correct local state when its ticket is still the newest one for that
//! product, so a stale reply cannot undo a later click.
//!
//! TRADE-OFFS
//! ==========
//! A reload triggered by another context replaces local state wholesale,
//! which can overwrite an optimistic change made here a moment earlier.
//! Whichever write reached storage last wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use super::emitter::{ChangeCause, Emitter, FavoritesChanged, Subscription};
use super::set::{FavoriteSet, ProductId};
use super::store::FavoritesStore;
use crate::storage::{Storage, StorageEvent, StorageEvents};

/// Observable per-product state, combining local membership and any
/// in-flight remote leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteState {
    Absent,
    /// Added locally, remote add not yet settled.
    PendingAdd,
    Present,
    /// Removed locally, remote removal not yet settled.
    PendingRemoval,
}

/// Proof of an optimistic change awaiting remote confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteTicket {
    pub product_id: ProductId,
    /// Membership the local change established.
    pub intended: bool,
    seq: u64,
}

#[derive(Debug, Clone, Copy)]
struct PendingRemote {
    seq: u64,
    intended: bool,
}

struct CoreState {
    favorites: FavoriteSet,
    version: u64,
    pending: HashMap<ProductId, PendingRemote>,
    next_seq: u64,
}

impl CoreState {
    fn track(&mut self, product_id: ProductId, intended: bool) -> RemoteTicket {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.pending.insert(product_id, PendingRemote { seq, intended });
        RemoteTicket { product_id, intended, seq }
    }

    fn insert(&mut self, id: ProductId) -> bool {
        !self.favorites.contains(id) && self.favorites.make_mut().insert(id)
    }

    fn remove(&mut self, id: ProductId) -> bool {
        self.favorites.contains(id) && self.favorites.make_mut().remove(&id)
    }
}

pub struct FavoritesManager {
    store: FavoritesStore,
    state: Mutex<CoreState>,
    emitter: Arc<Emitter>,
}

impl FavoritesManager {
    /// Build a core over `storage` using the default key, loading whatever is
    /// already persisted.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_store(FavoritesStore::new(storage))
    }

    pub fn with_store(store: FavoritesStore) -> Self {
        let favorites: FavoriteSet = store.load().into_iter().collect();
        debug!(count = favorites.len(), key = store.key(), "favorites loaded");
        Self {
            store,
            state: Mutex::new(CoreState { favorites, version: 0, pending: HashMap::new(), next_seq: 0 }),
            emitter: Emitter::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Persist, bump the version and queue an event. Caller holds the lock
    // and must call `emitter.flush()` once it is released.
    fn commit(&self, state: &mut CoreState, cause: ChangeCause) {
        self.store.save(&state.favorites.to_vec());
        state.version += 1;
        self.emitter.enqueue(FavoritesChanged { version: state.version, favorites: state.favorites.clone(), cause });
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut CoreState) -> (R, Option<ChangeCause>)) -> R {
        let (result, changed) = {
            let mut state = self.lock();
            let (result, cause) = f(&mut state);
            if let Some(cause) = cause {
                self.commit(&mut state, cause);
            }
            (result, cause.is_some())
        };
        if changed {
            self.emitter.flush();
        }
        result
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Current snapshot. O(1); the returned set never changes.
    #[must_use]
    pub fn favorites(&self) -> FavoriteSet {
        self.lock().favorites.clone()
    }

    #[must_use]
    pub fn is_favorite(&self, id: ProductId) -> bool {
        self.lock().favorites.contains(id)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.lock().favorites.len()
    }

    /// Version of the most recent committed change; 0 before any change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    #[must_use]
    pub fn favorite_state(&self, id: ProductId) -> FavoriteState {
        let state = self.lock();
        let present = state.favorites.contains(id);
        match (present, state.pending.get(&id)) {
            (true, Some(p)) if p.intended => FavoriteState::PendingAdd,
            (false, Some(p)) if !p.intended => FavoriteState::PendingRemoval,
            (true, _) => FavoriteState::Present,
            (false, _) => FavoriteState::Absent,
        }
    }

    #[must_use]
    pub fn store(&self) -> &FavoritesStore {
        &self.store
    }

    // =========================================================================
    // LOCAL MUTATIONS
    // =========================================================================

    /// Returns `true` when `id` was newly added.
    pub fn add_favorite(&self, id: ProductId) -> bool {
        self.mutate(|s| {
            let added = s.insert(id);
            (added, added.then_some(ChangeCause::Added(id)))
        })
    }

    /// Returns `true` when `id` was present and is now removed.
    pub fn remove_favorite(&self, id: ProductId) -> bool {
        self.mutate(|s| {
            let removed = s.remove(id);
            (removed, removed.then_some(ChangeCause::Removed(id)))
        })
    }

    /// Flip membership of `id`; returns the new membership.
    pub fn toggle_favorite(&self, id: ProductId) -> bool {
        self.mutate(|s| toggle_in(s, id))
    }

    /// Replace the local set with an authoritative server list.
    pub fn update_from_server(&self, ids: impl IntoIterator<Item = ProductId>) {
        let incoming: FavoriteSet = ids.into_iter().collect();
        self.mutate(|s| {
            s.favorites = incoming;
            ((), Some(ChangeCause::ServerReplaced))
        });
    }

    /// Union the local set with a server list. Returns `true` when anything
    /// was added; otherwise nothing is written or announced.
    pub fn merge_with_server(&self, ids: impl IntoIterator<Item = ProductId>) -> bool {
        self.mutate(|s| {
            let mut added = false;
            for id in ids {
                added |= s.insert(id);
            }
            (added, added.then_some(ChangeCause::ServerMerged))
        })
    }

    pub fn clear_all(&self) {
        self.mutate(|s| {
            s.favorites = FavoriteSet::new();
            ((), Some(ChangeCause::Cleared))
        });
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    /// Register `listener`. It receives the current snapshot right away and
    /// every change after that, in commit order.
    ///
    /// When called from inside another listener, the initial snapshot is
    /// delivered as soon as that listener returns.
    pub fn add_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&FavoritesChanged) + Send + Sync + 'static,
    {
        let subscription = {
            let state = self.lock();
            let initial = FavoritesChanged {
                version: state.version,
                favorites: state.favorites.clone(),
                cause: ChangeCause::Initial,
            };
            self.emitter.register(Arc::new(listener), initial)
        };
        self.emitter.flush();
        subscription
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.emitter.listener_count()
    }

    // =========================================================================
    // REMOTE LEG TRACKING
    // =========================================================================

    /// Optimistically toggle `id` and open a remote ticket for the new state.
    pub fn optimistic_toggle(&self, id: ProductId) -> RemoteTicket {
        self.mutate(|s| {
            let (now_favorite, cause) = toggle_in(s, id);
            (s.track(id, now_favorite), cause)
        })
    }

    /// Optimistically remove `id` (no-op locally when already absent) and open
    /// a remote ticket for the removal.
    pub fn optimistic_remove(&self, id: ProductId) -> RemoteTicket {
        self.mutate(|s| {
            let removed = s.remove(id);
            (s.track(id, false), removed.then_some(ChangeCause::Removed(id)))
        })
    }

    /// Open a ticket for a remote leg that mirrors existing local state.
    pub fn track_remote(&self, id: ProductId, intended: bool) -> RemoteTicket {
        self.lock().track(id, intended)
    }

    /// Settle `ticket`. `server_state` is the membership the server reported,
    /// if it reported one.
    ///
    /// Returns a warning when the server disagreed and local state was
    /// corrected. Stale tickets are ignored.
    pub fn finish_remote(&self, ticket: &RemoteTicket, server_state: Option<bool>) -> Option<String> {
        let id = ticket.product_id;
        self.mutate(|s| {
            let newest = s.pending.get(&id).is_some_and(|p| p.seq == ticket.seq);
            if !newest {
                return (None, None);
            }
            s.pending.remove(&id);
            match server_state {
                Some(server) if server != ticket.intended => {
                    let changed = if server { s.insert(id) } else { s.remove(id) };
                    if !changed {
                        return (None, None);
                    }
                    info!(product_id = %id, server, "server disagreed with optimistic favorite; corrected");
                    let warning = if server {
                        format!("server still lists product {id} as a favorite")
                    } else {
                        format!("server did not keep product {id} as a favorite")
                    };
                    (Some(warning), Some(ChangeCause::ServerCorrected(id)))
                }
                _ => (None, None),
            }
        })
    }

    // =========================================================================
    // CROSS-CONTEXT SYNC
    // =========================================================================

    /// Re-read persisted favorites and adopt them if they differ.
    ///
    /// An unreadable value is ignored rather than treated as "no favorites".
    /// Returns `true` when local state changed.
    pub fn reload_from_storage(&self) -> bool {
        {
            let mut state = self.lock();
            let Some(ids) = self.store.load_checked() else {
                return false;
            };
            let loaded: FavoriteSet = ids.into_iter().collect();
            if loaded == state.favorites {
                return false;
            }
            // Already persisted by the other context; no write-back.
            state.favorites = loaded;
            state.version += 1;
            self.emitter.enqueue(FavoritesChanged {
                version: state.version,
                favorites: state.favorites.clone(),
                cause: ChangeCause::ExternalReload,
            });
        }
        self.emitter.flush();
        true
    }

    /// React to a storage event from another context.
    pub fn handle_storage_event(&self, event: &StorageEvent) -> bool {
        if !event.affects(self.store.key()) {
            return false;
        }
        debug!(key = ?event.key, source = %event.source, "favorites changed in another context");
        self.reload_from_storage()
    }

    #[must_use]
    pub fn storage_events(&self) -> Option<StorageEvents> {
        self.store.subscribe()
    }
}

fn toggle_in(state: &mut CoreState, id: ProductId) -> (bool, Option<ChangeCause>) {
    if state.remove(id) {
        (false, Some(ChangeCause::Removed(id)))
    } else {
        state.insert(id);
        (true, Some(ChangeCause::Added(id)))
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
