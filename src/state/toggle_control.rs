//! State behind a product's favorite toggle button.
//!
//! DESIGN
//! ======
//! The control keeps a local boolean mirror so it can render without
//! querying the core on every frame. It follows external changes (the same
//! product toggled from another card) through `apply_change`, disables
//! itself while its own sync is in flight, and turns the settled
//! `SyncOutcome` into a transient notice.

#[cfg(test)]
#[path = "toggle_control_test.rs"]
mod toggle_control_test;

use crate::favorites::{FavoritesChanged, FavoritesManager, ProductId};
use crate::sync::SyncOutcome;

/// Severity of the toast shown after a toggle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    /// The local change stands but the service did not confirm it.
    Warning(String),
    /// Nothing changed.
    Error(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToggleControlState {
    pub product_id: ProductId,
    pub is_favorite: bool,
    /// `true` while a sync started by this control is in flight.
    pub pending: bool,
    pub notice: Option<Notice>,
}

impl ToggleControlState {
    #[must_use]
    pub fn new(product_id: ProductId, manager: &FavoritesManager) -> Self {
        Self { product_id, is_favorite: manager.is_favorite(product_id), pending: false, notice: None }
    }

    #[must_use]
    pub fn disabled(&self) -> bool {
        self.pending
    }

    /// Mirror a change published by the core.
    pub fn apply_change(&mut self, event: &FavoritesChanged) {
        self.is_favorite = event.favorites.contains(self.product_id);
    }

    /// Start a click. Returns `false` (ignore the click) while disabled.
    pub fn begin(&mut self) -> bool {
        if self.pending {
            return false;
        }
        self.pending = true;
        self.notice = None;
        true
    }

    /// Record the settled outcome and re-enable the control.
    pub fn finish(&mut self, outcome: &SyncOutcome) {
        self.pending = false;
        self.notice = Some(match (outcome.success, &outcome.error) {
            (false, error) => Notice::Error(error.clone().unwrap_or_else(|| "could not update favorites".to_owned())),
            (true, Some(error)) => Notice::Warning(format!("saved on this device only: {error}")),
            (true, None) if outcome.is_favorite => Notice::Info("added to favorites".to_owned()),
            (true, None) => Notice::Info("removed from favorites".to_owned()),
        });
        if outcome.success {
            self.is_favorite = outcome.is_favorite;
        }
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }
}
