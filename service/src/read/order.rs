//! [`Order`]-related read definitions.

use derive_more::Deref;

#[cfg(doc)]
use crate::domain::Order;

/// Indicator whether an [`Order`] replaced its previous revision, or lost the
/// race to a concurrent modification.
#[derive(Clone, Copy, Debug, Deref, Eq, Hash, PartialEq)]
pub struct Swapped(pub bool);

impl PartialEq<bool> for Swapped {
    fn eq(&self, other: &bool) -> bool {
        self.0 == *other
    }
}

/// Number of purged [`Order`]s.
#[derive(Clone, Copy, Debug, Deref, Eq, Hash, PartialEq)]
pub struct Purged(pub u64);
