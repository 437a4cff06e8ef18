//! State for the "my favorites" listing.
//!
//! SYSTEM CONTEXT
//! ==============
//! The page shows product details fetched from the remote service, so its
//! items can lag behind the id-only local set. Removals seen through core
//! change events drop items immediately. Additions of unknown products only
//! mark the page stale, since the page has no details for them until the
//! next load.

#[cfg(test)]
#[path = "favorites_page_test.rs"]
mod favorites_page_test;

use tracing::debug;

use crate::favorites::{FavoritesChanged, ProductId};
use crate::identity::UserIdentifier;
use crate::net::{ApiError, Product};
use crate::sync::FavoritesService;

#[derive(Clone, Debug, Default)]
pub struct FavoritesPageState {
    /// Products currently listed, in server order.
    pub items: Vec<Product>,
    /// True while a fetch is in flight.
    pub loading: bool,
    /// Message from the last failed fetch.
    pub error: Option<String>,
    /// Local favorites include products the listing has no details for.
    pub stale: bool,
}

impl FavoritesPageState {
    pub fn begin_load(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// Apply a fetch result. A failure keeps the previous items on screen.
    pub fn finish_load(&mut self, result: Result<Vec<Product>, ApiError>) {
        self.loading = false;
        match result {
            Ok(items) => {
                self.items = items;
                self.error = None;
                self.stale = false;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    /// Follow the core's membership: drop unlisted items, flag unknown ids.
    pub fn apply_change(&mut self, event: &FavoritesChanged) {
        self.items.retain(|p| event.favorites.contains(p.id));
        if event.favorites.iter().any(|id| !self.items.iter().any(|p| p.id == id)) {
            self.stale = true;
        }
    }

    /// Drop `id` right after the user removes it from this page, and flag
    /// the listing for a background refetch.
    pub fn mark_removed(&mut self, id: ProductId) {
        self.items.retain(|p| p.id != id);
        self.stale = true;
    }

    #[must_use]
    pub fn needs_refetch(&self) -> bool {
        self.stale && !self.loading
    }
}

/// Run one load cycle for the page.
///
/// Without a user identifier there is nothing to ask the service for; the
/// page shows an empty list and no request is made.
pub async fn load_favorites_page(state: &mut FavoritesPageState, service: &FavoritesService, user: Option<&UserIdentifier>) {
    let Some(user) = user else {
        debug!("no user identifier; favorites page left empty");
        *state = FavoritesPageState::default();
        return;
    };
    state.begin_load();
    let result = service.fetch_favorites_from_server(user).await;
    state.finish_load(result);
}
