//! Product identifiers and the favorites set value type.

use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Positive integer product identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(NonZeroU64);

impl ProductId {
    /// `None` for zero.
    #[must_use]
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ProductId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: u64 = s.trim().parse().map_err(|_| format!("invalid product id: {s}"))?;
        Self::new(raw).ok_or_else(|| "product id must be positive".to_owned())
    }
}

/// Immutable snapshot of favorited product ids.
///
/// Clones share storage, so handing a snapshot to every subscriber is O(1).
/// The core mutates through [`FavoriteSet::make_mut`], which copies only when
/// a snapshot is still held elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FavoriteSet(Arc<BTreeSet<ProductId>>);

impl FavoriteSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, id: ProductId) -> bool {
        self.0.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.0.iter().copied()
    }

    /// Ids in ascending order, the persisted representation.
    #[must_use]
    pub fn to_vec(&self) -> Vec<ProductId> {
        self.iter().collect()
    }

    pub(crate) fn make_mut(&mut self) -> &mut BTreeSet<ProductId> {
        Arc::make_mut(&mut self.0)
    }
}

impl FromIterator<ProductId> for FavoriteSet {
    fn from_iter<I: IntoIterator<Item = ProductId>>(iter: I) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

impl<'a> IntoIterator for &'a FavoriteSet {
    type Item = ProductId;
    type IntoIter = std::iter::Copied<std::collections::btree_set::Iter<'a, ProductId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}

#[cfg(test)]
#[path = "set_test.rs"]
mod tests;
