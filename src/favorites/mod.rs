//! Favorites core and its local persistence.
//!
//! ARCHITECTURE
//! ============
//! - `set`: `ProductId` and the immutable `FavoriteSet` snapshot type.
//! - `store`: fail-soft load/save of the persisted id list.
//! - `emitter`: ordered change fan-out to subscribers.
//! - `manager`: the core that ties them together.
//!
//! UI code only talks to `FavoritesManager` (query, mutate, subscribe) and
//! never touches storage directly.

pub mod emitter;
pub mod manager;
pub mod set;
pub mod store;

pub use emitter::{ChangeCause, FavoritesChanged, Subscription};
pub use manager::{FavoriteState, FavoritesManager, RemoteTicket};
pub use set::{FavoriteSet, ProductId};
pub use store::{DEFAULT_STORAGE_KEY, FavoritesStore};
