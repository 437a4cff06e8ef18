//! Browser-style key/value storage backends.
//!
//! DESIGN
//! ======
//! The favorites core persists through a synchronous string key/value API
//! modeled on `window.localStorage`. Backends decide durability and whether
//! writes are broadcast to other same-origin contexts (tabs). Consumers must
//! treat every write as fallible: quota and disabled storage are normal
//! runtime conditions, not bugs.

pub mod file;
pub mod memory;

use tokio::sync::broadcast;
use uuid::Uuid;

pub use file::FileStorage;
pub use memory::{MemoryStorage, MemoryStorageContext};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by storage backends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Storage is turned off for this context (private mode, policy, etc.).
    #[error("storage is disabled")]
    Disabled,

    /// The write would exceed the backend's byte quota.
    #[error("storage quota exceeded writing {key}: need {needed} bytes, quota {quota}")]
    QuotaExceeded { key: String, needed: usize, quota: usize },

    /// The backing medium failed.
    #[error("storage I/O failed: {0}")]
    Io(String),

    /// The backing medium holds data that cannot be decoded.
    #[error("storage contents corrupt: {0}")]
    Corrupt(String),
}

// =============================================================================
// STORAGE TRAIT
// =============================================================================

/// Synchronous string key/value store with `localStorage` semantics.
///
/// All methods take `&self`; implementations use interior mutability.
pub trait Storage: Send + Sync {
    /// Read the value for `key`. `Ok(None)` when the key is absent.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or replace the value for `key`.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Succeeds when the key was already absent.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Subscribe to writes made by *other* contexts sharing this backend.
    ///
    /// Backends without a cross-context signal return `None`.
    fn subscribe(&self) -> Option<StorageEvents> {
        None
    }
}

// =============================================================================
// CHANGE EVENTS
// =============================================================================

/// A change notification from another context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Key that changed. `None` means "anything may have changed; re-read".
    pub key: Option<String>,
    /// Value after the change, `None` for removals or resync hints.
    pub new_value: Option<String>,
    /// Context that performed the write.
    pub source: Uuid,
}

impl StorageEvent {
    /// Whether a listener interested in `key` should react to this event.
    #[must_use]
    pub fn affects(&self, key: &str) -> bool {
        self.key.as_deref().map_or(true, |k| k == key)
    }
}

/// Receiver half of a context's storage event stream.
///
/// Filters out the owning context's own writes, mirroring the browser rule
/// that a tab never receives `storage` events for its own writes.
pub struct StorageEvents {
    rx: broadcast::Receiver<StorageEvent>,
    own: Uuid,
}

impl StorageEvents {
    pub(crate) fn new(rx: broadcast::Receiver<StorageEvent>, own: Uuid) -> Self {
        Self { rx, own }
    }

    /// Wait for the next foreign event. Returns `None` once the backend is gone.
    ///
    /// A lagging receiver yields a keyless resync event instead of silently
    /// skipping the missed writes.
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.source == self.own => {}
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "storage event receiver lagged; forcing resync");
                    return Some(StorageEvent { key: None, new_value: None, source: Uuid::nil() });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
