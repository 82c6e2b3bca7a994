//! [`Query`] collection related to a [`Settlement`].

use common::operations::By;

use crate::domain::{order, Settlement};
#[cfg(doc)]
use crate::{domain::Order, Query};

use super::DatabaseQuery;

/// Queries a [`Settlement`] by the [`order::Id`] of its [`Order`].
pub type ByOrder = DatabaseQuery<By<Option<Settlement>, order::Id>>;
