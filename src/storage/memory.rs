//! In-process storage shared between simulated browser contexts.
//!
//! DESIGN
//! ======
//! `MemoryStorage` is the origin-wide backend. Each call to
//! [`MemoryStorage::context`] hands out a handle with its own context id,
//! standing in for one tab. Writes through a handle are broadcast to every
//! other handle's [`StorageEvents`] stream, which is how cross-tab favorites
//! synchronization is exercised without a browser.
//!
//! A byte quota and a disabled switch let callers reproduce the two failure
//! modes real `localStorage` exhibits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use uuid::Uuid;

use super::{Storage, StorageError, StorageEvent, StorageEvents};

const EVENT_CHANNEL_CAPACITY: usize = 64;

struct MemoryInner {
    items: HashMap<String, String>,
    quota: Option<usize>,
    disabled: bool,
}

impl MemoryInner {
    fn used_bytes_with(&self, key: &str, value: &str) -> usize {
        self.items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum::<usize>()
            + key.len()
            + value.len()
    }
}

/// Shared backend. Cheap to clone; all clones address the same items.
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryInner>>,
    events: broadcast::Sender<StorageEvent>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(MemoryInner { items: HashMap::new(), quota: None, disabled: false })),
            events,
        }
    }

    /// Backend that rejects writes pushing total key+value bytes past `quota`.
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        let storage = Self::new();
        storage.lock().quota = Some(quota);
        storage
    }

    /// Open a new context (tab) on this backend.
    #[must_use]
    pub fn context(&self) -> MemoryStorageContext {
        MemoryStorageContext { id: Uuid::new_v4(), backend: self.clone() }
    }

    /// Turn the backend on or off. Disabled storage fails every call.
    pub fn set_disabled(&self, disabled: bool) {
        self.lock().disabled = disabled;
    }

    /// Raw value for `key`, bypassing the disabled switch. Test inspection aid.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.lock().items.get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn broadcast(&self, source: Uuid, key: &str, new_value: Option<&str>) {
        // No receivers is the common single-tab case.
        let _ = self.events.send(StorageEvent {
            key: Some(key.to_owned()),
            new_value: new_value.map(str::to_owned),
            source,
        });
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// One context's view of a [`MemoryStorage`] backend.
#[derive(Clone)]
pub struct MemoryStorageContext {
    id: Uuid,
    backend: MemoryStorage,
}

impl MemoryStorageContext {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn backend(&self) -> &MemoryStorage {
        &self.backend
    }
}

impl Storage for MemoryStorageContext {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let inner = self.backend.lock();
        if inner.disabled {
            return Err(StorageError::Disabled);
        }
        Ok(inner.items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        {
            let mut inner = self.backend.lock();
            if inner.disabled {
                return Err(StorageError::Disabled);
            }
            if let Some(quota) = inner.quota {
                let needed = inner.used_bytes_with(key, value);
                if needed > quota {
                    return Err(StorageError::QuotaExceeded { key: key.to_owned(), needed, quota });
                }
            }
            inner.items.insert(key.to_owned(), value.to_owned());
        }
        self.backend.broadcast(self.id, key, Some(value));
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let removed = {
            let mut inner = self.backend.lock();
            if inner.disabled {
                return Err(StorageError::Disabled);
            }
            inner.items.remove(key).is_some()
        };
        if removed {
            self.backend.broadcast(self.id, key, None);
        }
        Ok(())
    }

    fn subscribe(&self) -> Option<StorageEvents> {
        Some(StorageEvents::new(self.backend.events.subscribe(), self.id))
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
