//! Restaurant [`Attribution`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf};
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user;

/// ID of a restaurant.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Relationship determining who, if anyone, receives commission for the
/// orders of a restaurant.
///
/// Resolved once, when the restaurant is registered, and only read afterwards.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Attribution {
    /// ID of the attributed restaurant.
    pub restaurant_id: Id,

    /// [`Referrer`] who registered the restaurant, if any.
    pub referrer: Option<Referrer>,

    /// [`DateTime`] when the restaurant was registered.
    pub registered_at: RegistrationDateTime,
}

impl Attribution {
    /// Returns ID of the supervisor entitled to commission, if any.
    ///
    /// Restaurants registered by a platform operator (or by nobody) pay no
    /// commission: the platform keeps that share.
    #[must_use]
    pub fn supervisor_id(&self) -> Option<user::Id> {
        match self.referrer? {
            Referrer::Supervisor(id) => Some(id),
            Referrer::PlatformOperator(_) => None,
        }
    }
}

/// User who registered a restaurant on the marketplace.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Referrer {
    /// Referral supervisor, entitled to a per-item commission.
    Supervisor(user::Id),

    /// Platform operator, entitled to nothing beyond platform earnings.
    PlatformOperator(user::Id),
}

impl Referrer {
    /// Constructs a [`Referrer`] out of its stored parts.
    #[must_use]
    pub fn from_parts(kind: ReferrerKind, id: user::Id) -> Self {
        match kind {
            ReferrerKind::Supervisor => Self::Supervisor(id),
            ReferrerKind::PlatformOperator => Self::PlatformOperator(id),
        }
    }

    /// Returns [`ReferrerKind`] of this [`Referrer`].
    #[must_use]
    pub fn kind(self) -> ReferrerKind {
        match self {
            Self::Supervisor(_) => ReferrerKind::Supervisor,
            Self::PlatformOperator(_) => ReferrerKind::PlatformOperator,
        }
    }

    /// Returns ID of the referring user.
    #[must_use]
    pub fn user_id(self) -> user::Id {
        match self {
            Self::Supervisor(id) | Self::PlatformOperator(id) => id,
        }
    }
}

define_kind! {
    #[doc = "Kind of a [`Referrer`]."]
    enum ReferrerKind {
        #[doc = "[`Referrer::Supervisor`]."]
        Supervisor = 1,

        #[doc = "[`Referrer::PlatformOperator`]."]
        PlatformOperator = 2,
    }
}

/// [`DateTime`] when a restaurant was registered.
pub type RegistrationDateTime = DateTimeOf<(Attribution, unit::Creation)>;
