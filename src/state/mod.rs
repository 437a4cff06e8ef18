//! Frontend state consumed by the favorites UI.
//!
//! These models read the core through queries and change events only; they
//! never touch storage or the remote service directly.

pub mod favorites_page;
pub mod toggle_control;

pub use favorites_page::{FavoritesPageState, load_favorites_page};
pub use toggle_control::{Notice, ToggleControlState};
