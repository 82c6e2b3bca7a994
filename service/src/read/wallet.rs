//! [`Wallet`]-related read definitions.

use derive_more::Deref;

#[cfg(doc)]
use crate::domain::{wallet::Posting, Wallet};

/// Indicator whether a [`Posting`] has been applied to its [`Wallet`].
///
/// A guarded [`Posting`] is not applied when the [`Wallet`] balance doesn't
/// cover it.
#[derive(Clone, Copy, Debug, Deref, Eq, Hash, PartialEq)]
pub struct Applied(pub bool);

impl PartialEq<bool> for Applied {
    fn eq(&self, other: &bool) -> bool {
        self.0 == *other
    }
}
