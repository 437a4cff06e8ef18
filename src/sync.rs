//! Favorites sync service: optimistic local commits confirmed remotely.
//!
//! DESIGN
//! ======
//! Every user-facing mutation is split in two phases:
//!
//! 1. A synchronous local commit through `FavoritesManager` (storage write
//!    and subscriber notification happen before the call returns).
//! 2. A detached `tokio` task that runs the remote leg and settles the
//!    manager's ticket. Its only output is a [`RemoteOutcome`]; it never
//!    rolls back the local commit.
//!
//! `begin_*` methods expose the split as [`PendingSync`]. The `toggle_favorite`
//! and `remove_favorite` wrappers await it and fold the result into a
//! [`SyncOutcome`] for callers that just want `{success, error}`.
//!
//! ERROR HANDLING
//! ==============
//! Remote failures during mutations become warning strings. Only the explicit
//! "fetch my favorites" read and reconciliation return `Err`, because an
//! empty list would be indistinguishable from "no favorites".
//! Every remote leg is bounded by `remote_timeout`.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::favorites::{FavoritesManager, ProductId, RemoteTicket};
use crate::identity::UserIdentifier;
use crate::net::{ApiError, FavoritesApi, Product};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("a user identifier is required to sync favorites")]
    MissingUserIdentifier,
}

/// Flattened result of a synced mutation.
///
/// `success` is `false` only when a precondition failed and nothing changed.
/// `success: true` with `error: Some(_)` means the local change stands but
/// the service did not confirm it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub success: bool,
    /// Local membership once the operation settled.
    pub is_favorite: bool,
    pub error: Option<String>,
}

/// What the detached remote leg produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOutcome {
    /// Local membership after the ticket was settled.
    pub is_favorite: bool,
    pub warning: Option<String>,
}

/// Handle to a detached remote confirmation. Dropping it does not cancel
/// the remote call.
pub struct RemoteConfirmation {
    product_id: ProductId,
    intended: bool,
    handle: JoinHandle<RemoteOutcome>,
}

impl RemoteConfirmation {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn outcome(self) -> RemoteOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, product_id = %self.product_id, "remote favorite task did not complete");
                RemoteOutcome { is_favorite: self.intended, warning: Some(format!("remote sync interrupted: {e}")) }
            }
        }
    }
}

/// Immediate result of the local phase plus the pending remote phase.
pub struct PendingSync {
    /// Membership right after the optimistic commit.
    pub is_favorite: bool,
    pub confirmation: RemoteConfirmation,
}

impl PendingSync {
    pub async fn settle(self) -> SyncOutcome {
        let remote = self.confirmation.outcome().await;
        SyncOutcome { success: true, is_favorite: remote.is_favorite, error: remote.warning }
    }
}

/// Summary of [`FavoritesService::reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub server_count: usize,
    /// Local-only favorites the service accepted.
    pub pushed: Vec<ProductId>,
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct FavoritesService {
    manager: Arc<FavoritesManager>,
    api: Arc<dyn FavoritesApi>,
    remote_timeout: Duration,
}

impl FavoritesService {
    pub fn new(manager: Arc<FavoritesManager>, api: Arc<dyn FavoritesApi>) -> Self {
        Self { manager, api, remote_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS) }
    }

    #[must_use]
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    #[must_use]
    pub fn manager(&self) -> &Arc<FavoritesManager> {
        &self.manager
    }

    // =========================================================================
    // TWO-PHASE MUTATIONS
    // =========================================================================

    /// Toggle `id` locally and start the remote add/remove.
    ///
    /// Must be called inside a `tokio` runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MissingUserIdentifier`] without touching local
    /// state when `user` is `None`.
    pub fn begin_toggle(&self, id: ProductId, user: Option<&UserIdentifier>) -> Result<PendingSync, SyncError> {
        let user = user.cloned().ok_or(SyncError::MissingUserIdentifier)?;
        let ticket = self.manager.optimistic_toggle(id);
        Ok(self.confirm(ticket, user))
    }

    /// Remove `id` locally and start the remote removal.
    ///
    /// # Errors
    ///
    /// Same precondition as [`FavoritesService::begin_toggle`].
    pub fn begin_remove(&self, id: ProductId, user: Option<&UserIdentifier>) -> Result<PendingSync, SyncError> {
        let user = user.cloned().ok_or(SyncError::MissingUserIdentifier)?;
        let ticket = self.manager.optimistic_remove(id);
        Ok(self.confirm(ticket, user))
    }

    pub async fn toggle_favorite(&self, id: ProductId, user: Option<&UserIdentifier>) -> SyncOutcome {
        match self.begin_toggle(id, user) {
            Ok(pending) => pending.settle().await,
            Err(e) => self.precondition_failed(id, &e),
        }
    }

    pub async fn remove_favorite(&self, id: ProductId, user: Option<&UserIdentifier>) -> SyncOutcome {
        match self.begin_remove(id, user) {
            Ok(pending) => pending.settle().await,
            Err(e) => self.precondition_failed(id, &e),
        }
    }

    fn precondition_failed(&self, id: ProductId, e: &SyncError) -> SyncOutcome {
        debug!(product_id = %id, error = %e, "favorite sync precondition failed");
        SyncOutcome { success: false, is_favorite: self.manager.is_favorite(id), error: Some(e.to_string()) }
    }

    fn confirm(&self, ticket: RemoteTicket, user: UserIdentifier) -> PendingSync {
        let service = self.clone();
        let handle = tokio::spawn(async move { service.settle_remote(ticket, user).await });
        PendingSync {
            is_favorite: ticket.intended,
            confirmation: RemoteConfirmation { product_id: ticket.product_id, intended: ticket.intended, handle },
        }
    }

    async fn settle_remote(&self, ticket: RemoteTicket, user: UserIdentifier) -> RemoteOutcome {
        let id = ticket.product_id;
        let call = async {
            if ticket.intended {
                self.api.add_favorite(&user, id).await
            } else {
                self.api.remove_favorite(&user, id).await
            }
        };
        let warning = match self.bounded(call).await {
            Ok(ack) => self.manager.finish_remote(&ticket, ack.is_favorite),
            Err(e) => {
                warn!(
                    error = %e,
                    code = e.error_code(),
                    product_id = %id,
                    user_id = %user,
                    "remote favorite sync failed; keeping local state"
                );
                self.manager.finish_remote(&ticket, None);
                Some(e.to_string())
            }
        };
        RemoteOutcome { is_favorite: self.manager.is_favorite(id), warning }
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T, ApiError>>) -> Result<T, ApiError> {
        tokio::time::timeout(self.remote_timeout, call)
            .await
            .unwrap_or_else(|_| Err(ApiError::Timeout(self.remote_timeout)))
    }

    // =========================================================================
    // AUTHORITATIVE READS
    // =========================================================================

    /// Fetch the user's favorites from the service and adopt them locally.
    ///
    /// # Errors
    ///
    /// Propagates every remote failure; local state is untouched in that case.
    pub async fn fetch_favorites_from_server(&self, user: &UserIdentifier) -> Result<Vec<Product>, ApiError> {
        let products = self.bounded(self.api.list_favorites(user)).await.inspect_err(|e| {
            warn!(error = %e, code = e.error_code(), user_id = %user, "favorites fetch failed");
        })?;
        self.manager.update_from_server(products.iter().map(|p| p.id));
        info!(user_id = %user, count = products.len(), "favorites fetched from server");
        Ok(products)
    }

    /// Union the server's list into local state and push favorites that only
    /// exist locally (for example, made before the visitor had an id).
    ///
    /// Removals are not propagated in either direction: an id the server
    /// still lists comes back even if it was removed locally while offline.
    ///
    /// # Errors
    ///
    /// Fails only when the initial list call fails; individual push failures
    /// are reported in [`ReconcileReport::warnings`].
    pub async fn reconcile(&self, user: &UserIdentifier) -> Result<ReconcileReport, ApiError> {
        let products = self.bounded(self.api.list_favorites(user)).await?;
        let server: BTreeSet<ProductId> = products.iter().map(|p| p.id).collect();
        let local_only: Vec<ProductId> = self.manager.favorites().iter().filter(|id| !server.contains(id)).collect();

        self.manager.merge_with_server(server.iter().copied());

        let mut report = ReconcileReport { server_count: server.len(), ..ReconcileReport::default() };
        for id in local_only {
            let ticket = self.manager.track_remote(id, true);
            match self.bounded(self.api.add_favorite(user, id)).await {
                Ok(ack) => match self.manager.finish_remote(&ticket, ack.is_favorite) {
                    Some(warning) => report.warnings.push(warning),
                    None => report.pushed.push(id),
                },
                Err(e) => {
                    self.manager.finish_remote(&ticket, None);
                    warn!(error = %e, product_id = %id, user_id = %user, "local-only favorite not pushed");
                    report.warnings.push(format!("product {id}: {e}"));
                }
            }
        }
        info!(
            user_id = %user,
            server = report.server_count,
            pushed = report.pushed.len(),
            warnings = report.warnings.len(),
            "favorites reconciled"
        );
        Ok(report)
    }

    // =========================================================================
    // CROSS-CONTEXT SYNC
    // =========================================================================

    /// Spawn the task that reloads favorites when another context writes
    /// them. Returns `None` when the storage backend has no change signal.
    ///
    /// The task holds the manager weakly and stops once it is dropped or the
    /// backend's event stream closes.
    #[must_use]
    pub fn spawn_storage_sync(&self) -> Option<JoinHandle<()>> {
        let mut events = self.manager.storage_events()?;
        let manager: Weak<FavoritesManager> = Arc::downgrade(&self.manager);
        Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.handle_storage_event(&event);
            }
            debug!("favorites storage sync stopped");
        }))
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use crate::net::RemoteAck;
    use crate::storage::MemoryStorage;

    pub fn pid(raw: u64) -> ProductId {
        ProductId::new(raw).unwrap()
    }

    pub fn user(raw: &str) -> UserIdentifier {
        UserIdentifier::new(raw).unwrap()
    }

    // Scriptable in-memory stand-in for the remote favorites service.

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        List(String),
        Add(String, u64),
        Remove(String, u64),
    }

    #[derive(Clone, Copy)]
    pub enum Mode {
        Succeed,
        Fail,
        Slow(Duration),
        Report(bool),
    }

    pub struct StubApi {
        mode: Mode,
        pub server: Mutex<Vec<u64>>,
        calls: Mutex<Vec<Call>>,
        // When set, each call waits for one permit before answering.
        gate: Option<Arc<Semaphore>>,
    }

    impl StubApi {
        pub fn new(mode: Mode) -> Arc<Self> {
            Arc::new(Self { mode, server: Mutex::new(Vec::new()), calls: Mutex::new(Vec::new()), gate: None })
        }

        pub fn gated(mode: Mode, gate: Arc<Semaphore>) -> Arc<Self> {
            Arc::new(Self { mode, server: Mutex::new(Vec::new()), calls: Mutex::new(Vec::new()), gate: Some(gate) })
        }

        pub fn with_server(mode: Mode, ids: &[u64]) -> Arc<Self> {
            let stub = Self::new(mode);
            stub.server.lock().unwrap().extend_from_slice(ids);
            stub
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        async fn respond(&self, call: Call) -> Result<RemoteAck, ApiError> {
            self.calls.lock().unwrap().push(call);
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            match self.mode {
                Mode::Succeed => Ok(RemoteAck::default()),
                Mode::Fail => Err(ApiError::Request("connection refused".into())),
                Mode::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(RemoteAck::default())
                }
                Mode::Report(state) => Ok(RemoteAck { is_favorite: Some(state) }),
            }
        }
    }

    #[async_trait]
    impl FavoritesApi for StubApi {
        async fn list_favorites(&self, user: &UserIdentifier) -> Result<Vec<Product>, ApiError> {
            self.respond(Call::List(user.to_string())).await?;
            let ids = self.server.lock().unwrap().clone();
            Ok(ids.into_iter().map(|raw| Product::new(pid(raw))).collect())
        }

        async fn add_favorite(&self, user: &UserIdentifier, product_id: ProductId) -> Result<RemoteAck, ApiError> {
            self.respond(Call::Add(user.to_string(), product_id.get())).await
        }

        async fn remove_favorite(&self, user: &UserIdentifier, product_id: ProductId) -> Result<RemoteAck, ApiError> {
            self.respond(Call::Remove(user.to_string(), product_id.get())).await
        }
    }

    pub fn service_on(backend: &MemoryStorage, api: &Arc<StubApi>) -> FavoritesService {
        let manager = Arc::new(FavoritesManager::new(Arc::new(backend.context())));
        FavoritesService::new(manager, Arc::clone(api) as Arc<dyn FavoritesApi>)
    }

    pub async fn wait_until(mut done: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !done() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
