//! Visitor identity for the remote favorites API.
//!
//! DESIGN
//! ======
//! The remote service keys favorites by a user identifier read from the
//! `userId` cookie. Anonymous visitors get a generated
//! `browser_<ms-timestamp>_<9 chars>` id on their first favorite interaction,
//! stored as a one-year, `SameSite=Lax`, `Path=/` cookie. Once written the id
//! is never rotated by this crate.
//!
//! TRADE-OFFS
//! ==========
//! Generated ids are stable per browser profile but not unique across
//! devices, and carry no authentication.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use cookie::{Cookie, SameSite};
use rand::Rng;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

use crate::storage::{Storage, StorageError};

pub const USER_ID_COOKIE: &str = "userId";
const COOKIE_KEY_PREFIX: &str = "cookie:";
const BROWSER_ID_PREFIX: &str = "browser_";
const RANDOM_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque, non-empty user identifier sent to the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct UserIdentifier(String);

impl UserIdentifier {
    /// `None` for empty or whitespace-only values.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_generated(&self) -> bool {
        self.0.starts_with(BROWSER_ID_PREFIX)
    }
}

impl fmt::Display for UserIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build a browser identifier from a timestamp and an RNG.
pub fn browser_identifier_with<R: Rng + ?Sized>(now_ms: u128, rng: &mut R) -> UserIdentifier {
    let suffix: String = (0..RANDOM_SUFFIX_LEN)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect();
    UserIdentifier(format!("{BROWSER_ID_PREFIX}{now_ms}_{suffix}"))
}

/// Build a browser identifier for the current instant.
#[must_use]
pub fn generate_browser_identifier() -> UserIdentifier {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    browser_identifier_with(now_ms, &mut rand::rng())
}

/// Cookie jar for the visitor identity, persisted through a [`Storage`]
/// backend under `cookie:<name>` in `Set-Cookie` form.
///
/// The last identifier handed out is also kept in memory (shared between
/// clones), so a visitor whose cookie cannot be written still keeps one id
/// for the lifetime of the store.
#[derive(Clone)]
pub struct IdentityStore {
    storage: Arc<dyn Storage>,
    session: Arc<Mutex<Option<UserIdentifier>>>,
}

impl IdentityStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage, session: Arc::new(Mutex::new(None)) }
    }

    fn session(&self) -> MutexGuard<'_, Option<UserIdentifier>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current identifier: an unexpired cookie, else the one this store
    /// already issued.
    #[must_use]
    pub fn current(&self) -> Option<UserIdentifier> {
        let session = self.session();
        self.cookie_at(OffsetDateTime::now_utc()).or_else(|| session.clone())
    }

    fn cookie_at(&self, now: OffsetDateTime) -> Option<UserIdentifier> {
        let raw = match self.storage.get_item(&cookie_key(USER_ID_COOKIE)) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "user id cookie unreadable");
                return None;
            }
        };
        let cookie = Cookie::parse(raw).ok()?;
        if cookie.expires_datetime().is_some_and(|expires| expires <= now) {
            return None;
        }
        UserIdentifier::new(cookie.value())
    }

    /// Return the existing identifier or create, persist and return a new
    /// browser identifier.
    ///
    /// A failed cookie write still yields an identifier, and every later
    /// call on this store returns the same one; it just will not survive a
    /// reload.
    pub fn ensure(&self) -> UserIdentifier {
        let mut session = self.session();
        if let Some(existing) = self.cookie_at(OffsetDateTime::now_utc()).or_else(|| session.clone()) {
            return existing;
        }
        let id = generate_browser_identifier();
        match self.write_cookie(&id) {
            Ok(()) => info!(user_id = %id, "generated browser identifier"),
            Err(e) => warn!(error = %e, user_id = %id, "browser identifier not persisted"),
        }
        *session = Some(id.clone());
        id
    }

    /// Store `id` (for example a server-issued one) as the `userId` cookie.
    ///
    /// The id is adopted in memory even when the cookie write fails.
    pub fn remember(&self, id: &UserIdentifier) -> Result<(), StorageError> {
        let mut session = self.session();
        *session = Some(id.clone());
        self.write_cookie(id)
    }

    fn write_cookie(&self, id: &UserIdentifier) -> Result<(), StorageError> {
        let cookie = user_id_cookie(id, OffsetDateTime::now_utc());
        self.storage.set_item(&cookie_key(USER_ID_COOKIE), &cookie.to_string())
    }
}

/// The `userId` cookie as written to the browser.
#[must_use]
pub fn user_id_cookie(id: &UserIdentifier, now: OffsetDateTime) -> Cookie<'static> {
    Cookie::build((USER_ID_COOKIE, id.as_str().to_owned()))
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(Duration::days(365))
        .expires(now + Duration::days(365))
        .build()
}

fn cookie_key(name: &str) -> String {
    format!("{COOKIE_KEY_PREFIX}{name}")
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
