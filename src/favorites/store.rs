//! Local store adapter: the persisted favorites list.
//!
//! ERROR HANDLING
//! ==============
//! Both directions fail soft. A missing, unreadable, or corrupt value loads
//! as an empty list; a failed write is logged and reported through the
//! returned flag only. Favorites stay usable in memory either way.

use std::sync::Arc;

use tracing::warn;

use super::set::ProductId;
use crate::storage::{Storage, StorageEvents};

/// Default `localStorage` key holding the JSON array of product ids.
pub const DEFAULT_STORAGE_KEY: &str = "favorites";

#[derive(Clone)]
pub struct FavoritesStore {
    storage: Arc<dyn Storage>,
    key: String,
}

impl FavoritesStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_key(storage, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self { storage, key: key.into() }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the persisted ids. Never fails; see module docs.
    #[must_use]
    pub fn load(&self) -> Vec<ProductId> {
        self.load_checked().unwrap_or_default()
    }

    /// Like [`FavoritesStore::load`], but distinguishes "nothing persisted"
    /// (`Some(vec![])`) from "could not read a trustworthy value" (`None`).
    #[must_use]
    pub fn load_checked(&self) -> Option<Vec<ProductId>> {
        let raw = match self.storage.get_item(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Some(Vec::new()),
            Err(e) => {
                warn!(error = %e, key = %self.key, "favorites load failed");
                return None;
            }
        };
        match serde_json::from_str::<Vec<ProductId>>(&raw) {
            Ok(ids) => Some(ids),
            Err(e) => {
                warn!(error = %e, key = %self.key, "persisted favorites corrupt");
                None
            }
        }
    }

    /// Serialize and write `ids`. Returns `false` when the write did not land.
    pub fn save(&self, ids: &[ProductId]) -> bool {
        let raw = match serde_json::to_string(ids) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "favorites serialize failed");
                return false;
            }
        };
        match self.storage.set_item(&self.key, &raw) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, key = %self.key, count = ids.len(), "favorites save failed");
                false
            }
        }
    }

    /// Cross-context change stream of the underlying backend, if it has one.
    #[must_use]
    pub fn subscribe(&self) -> Option<StorageEvents> {
        self.storage.subscribe()
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
