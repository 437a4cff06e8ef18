//! Remote favorites service: transport seam, HTTP client and wire types.

pub mod api;
pub mod types;

pub use api::{FavoritesApi, HttpFavoritesApi};
pub use types::{ApiError, Product, RemoteAck};
