//! Client-side favorites for the shoe storefront.
//!
//! A [`favorites::FavoritesManager`] owns the visitor's favorite product ids,
//! persists every change to a [`storage::Storage`] backend and notifies
//! subscribers. [`sync::FavoritesService`] layers the remote favorites API on
//! top: mutations commit locally first and are confirmed in the background.

pub mod config;
pub mod favorites;
pub mod identity;
pub mod net;
pub mod state;
pub mod storage;
pub mod sync;
