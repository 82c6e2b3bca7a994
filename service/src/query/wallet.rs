//! [`Query`] collection related to a [`Wallet`].

use common::operations::By;

use crate::domain::{
    wallet::{Owner, Posting},
    Wallet,
};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries a [`Wallet`] by its [`Owner`].
///
/// [`None`] means nothing was ever posted to the [`Owner`].
pub type ByOwner = DatabaseQuery<By<Option<Wallet>, Owner>>;

/// Queries the [`Posting`]s history of a [`Wallet`] by its [`Owner`], oldest
/// first.
pub type Transactions = DatabaseQuery<By<Vec<Posting>, Owner>>;
