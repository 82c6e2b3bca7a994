//! [`Offer`]-related read definitions.

use derive_more::Deref;

#[cfg(doc)]
use crate::domain::{offer::Usage, Offer};

/// Indicator whether an [`Usage`] was recorded for the first time, so the
/// [`Offer::usage_count`] has been incremented.
#[derive(Clone, Copy, Debug, Deref, Eq, Hash, PartialEq)]
pub struct Recorded(pub bool);

impl PartialEq<bool> for Recorded {
    fn eq(&self, other: &bool) -> bool {
        self.0 == *other
    }
}
